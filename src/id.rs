//! ID generation utilities for claimflow

use uuid::Uuid;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Generate a unique claim ID
///
/// Format: `clm-{uuid_simple}`
/// Example: `clm-67e5504410b1426f9247bb680e5fe0c8`
pub fn generate_claim_id() -> String {
    format!("clm-{}", Uuid::new_v4().simple())
}

/// Shorten an ID for log lines, keeping the prefix and the first
/// hex characters after it
///
/// Example: `clm-67e5504410b1426f9247bb680e5fe0c8` becomes `clm-67e55044`
pub fn short_id(id: &str) -> String {
    match id.split_once('-') {
        Some((prefix, rest)) if rest.len() > 8 => format!("{}-{}", prefix, &rest[..8]),
        _ => id.to_string(),
    }
}
