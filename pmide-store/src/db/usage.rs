//! Token usage ledger

use pmide_common::{time, uuid_utils, Result};
use sqlx::SqlitePool;

use crate::models::{TokenUsageRecord, UsageBucket, UsageSummary};

const COLUMNS: &str = "id, conversation_id, model, input_tokens, output_tokens, cost, date, created_at";

/// Record one request's usage under today's UTC date
pub async fn record_token_usage(
    pool: &SqlitePool,
    conversation_id: Option<&str>,
    model: &str,
    input_tokens: i64,
    output_tokens: i64,
    cost: f64,
) -> Result<TokenUsageRecord> {
    let record = TokenUsageRecord {
        id: uuid_utils::generate_id(),
        conversation_id: conversation_id.map(str::to_string),
        model: model.to_string(),
        input_tokens,
        output_tokens,
        cost,
        date: time::today(),
        created_at: time::now_secs(),
    };

    sqlx::query(&format!(
        "INSERT INTO token_usage ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        COLUMNS
    ))
    .bind(&record.id)
    .bind(&record.conversation_id)
    .bind(&record.model)
    .bind(record.input_tokens)
    .bind(record.output_tokens)
    .bind(record.cost)
    .bind(&record.date)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(record)
}

/// Usage between two `YYYY-MM-DD` dates, both inclusive
pub async fn get_token_usage_by_date_range(
    pool: &SqlitePool,
    start: &str,
    end: &str,
) -> Result<Vec<TokenUsageRecord>> {
    time::parse_date(start)?;
    time::parse_date(end)?;

    let rows = sqlx::query_as::<_, TokenUsageRecord>(&format!(
        "SELECT {} FROM token_usage WHERE date >= ? AND date <= ? ORDER BY created_at ASC, rowid ASC",
        COLUMNS
    ))
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_all_token_usage(pool: &SqlitePool) -> Result<Vec<TokenUsageRecord>> {
    let rows = sqlx::query_as::<_, TokenUsageRecord>(&format!(
        "SELECT {} FROM token_usage ORDER BY created_at ASC, rowid ASC",
        COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Totals plus per-day and per-model buckets, optionally bounded by date
pub async fn usage_summary(pool: &SqlitePool, start: Option<&str>, end: Option<&str>) -> Result<UsageSummary> {
    if let Some(start) = start {
        time::parse_date(start)?;
    }
    if let Some(end) = end {
        time::parse_date(end)?;
    }
    // Unbounded ends compare against sentinels outside the date range
    let start = start.unwrap_or("0000-00-00");
    let end = end.unwrap_or("9999-99-99");

    let by_day = buckets(pool, "date", start, end).await?;
    let by_model = buckets(pool, "model", start, end).await?;

    let mut summary = UsageSummary {
        input_tokens: 0,
        output_tokens: 0,
        total_cost: 0.0,
        requests: 0,
        by_day,
        by_model,
    };
    for bucket in &summary.by_day {
        summary.input_tokens += bucket.input_tokens;
        summary.output_tokens += bucket.output_tokens;
        summary.total_cost += bucket.cost;
        summary.requests += bucket.requests;
    }
    Ok(summary)
}

async fn buckets(pool: &SqlitePool, column: &'static str, start: &str, end: &str) -> Result<Vec<UsageBucket>> {
    let rows = sqlx::query_as::<_, UsageBucket>(&format!(
        r#"
        SELECT {col} AS key,
               COALESCE(SUM(input_tokens), 0) AS input_tokens,
               COALESCE(SUM(output_tokens), 0) AS output_tokens,
               COALESCE(SUM(cost), 0.0) AS cost,
               COUNT(*) AS requests
        FROM token_usage
        WHERE date >= ? AND date <= ?
        GROUP BY {col}
        ORDER BY {col} ASC
        "#,
        col = column
    ))
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
