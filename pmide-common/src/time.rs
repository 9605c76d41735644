//! Timestamp utilities
//!
//! Rows store Unix seconds; token usage is bucketed by UTC calendar date.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{Error, Result};

/// Format used for usage buckets and date-range queries
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix seconds
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// Today's UTC date as `YYYY-MM-DD`
pub fn today() -> String {
    Utc::now().format(DATE_FORMAT).to_string()
}

/// Validate a `YYYY-MM-DD` date string
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| Error::InvalidInput(format!("Invalid date '{}', expected YYYY-MM-DD", s)))
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_today_is_parseable() {
        assert!(parse_date(&today()).is_ok());
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2024/01/01").is_err());
    }

    #[test]
    fn test_parse_date_accepts_leap_day() {
        let d = parse_date("2024-02-29").unwrap();
        assert_eq!(d.to_string(), "2024-02-29");
    }

    #[test]
    fn test_millis_to_duration_one_second() {
        assert_eq!(millis_to_duration(1000), Duration::from_secs(1));
    }
}
