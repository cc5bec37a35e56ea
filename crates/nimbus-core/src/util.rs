//! Shared utility functions used across multiple modules.

use std::time::Duration;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Convert a duration to whole milliseconds, saturating at `i64::MAX`.
pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Human friendly age of a timestamp ("just now", "5m ago", "3h ago", "2d ago").
pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let elapsed_secs = now_ms.saturating_sub(timestamp_ms).max(0) / 1000;
    match elapsed_secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", elapsed_secs / 60),
        3_600..=86_399 => format!("{}h ago", elapsed_secs / 3_600),
        _ => format!("{}d ago", elapsed_secs / 86_400),
    }
}
