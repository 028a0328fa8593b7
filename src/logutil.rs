//! Logging helpers that keep user-supplied chat content on a single log line.
//!
//! Chat messages routinely contain newlines, tabs and mention markup; logging
//! them raw breaks line-oriented log tooling.

/// Longest preview of user content kept in a log line.
const MAX_PREVIEW: usize = 200;

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
/// - other control characters => `\xNN`
///
/// Content longer than 200 characters is cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// `username(id)` label used in battle log lines.
pub fn user_label(username: &str, id: &str) -> String {
    format!("{}({})", escape_log(username), escape_log(id))
}
