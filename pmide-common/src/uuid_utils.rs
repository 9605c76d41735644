//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new UUIDv4 as a hyphenated string (primary key format)
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

/// Sidecar-style conversation id: `conv-` followed by 16 hex characters
pub fn conversation_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("conv-{}", &simple[..16])
}
