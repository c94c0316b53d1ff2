//! Shared helpers for the HTTP contract tests.

#![allow(dead_code)]

/// Bearer header pair for an authenticated request
pub fn auth_header(token: &str) -> (String, String) {
    ("Authorization".to_string(), format!("Bearer {}", token))
}

/// Generate a unique test identifier so reruns against the same
/// database never collide on unique columns
pub fn test_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}", timestamp)
}
