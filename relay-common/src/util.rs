//! Utility functions shared by the relay crates.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries, so multi-byte UTF-8 input (emoji, CJK,
/// Cyrillic) is never cut mid-character.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Replace every occurrence of `secret` in `s` with a redaction marker.
///
/// Bot API URLs embed the bot token, and transport errors echo the URL.
pub fn redact_secret(s: &str, secret: &str) -> String {
    if secret.is_empty() {
        return s.to_string();
    }
    s.replace(secret, "***REDACTED***")
}
