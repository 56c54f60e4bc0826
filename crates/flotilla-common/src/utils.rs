//! Utility functions shared across the codebase.

use chrono::NaiveDateTime;

/// Current UTC time as a naive timestamp, the representation used by all
/// persisted columns.
pub fn now_utc() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Truncate a message to a bounded length for storage in error/result
/// columns, appending an ellipsis marker when cut.
pub fn truncate_message(message: &str, max_len: usize) -> String {
    if message.len() <= max_len {
        return message.to_string();
    }
    let mut cut = max_len;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &message[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_message_unchanged() {
        assert_eq!(truncate_message("ok", 10), "ok");
    }

    #[test]
    fn test_truncate_long_message() {
        let truncated = truncate_message("abcdefghij", 4);
        assert_eq!(truncated, "abcd...");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let truncated = truncate_message("héllo wörld", 3);
        assert!(truncated.ends_with("..."));
    }
}
