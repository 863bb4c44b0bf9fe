//! Helpers for putting user-supplied text and ids into log lines.

/// Longest user string reproduced in a log line.
const MAX_PREVIEW: usize = 80;

/// Escape a user-supplied string (character name, room name, email) so it
/// stays on one log line: newlines, tabs, backslashes and other control
/// characters are escaped, and anything past [`MAX_PREVIEW`] characters is
/// replaced by an ellipsis.
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

/// First eight characters of a document or account id.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_newlines_and_truncates() {
        assert_eq!(escape_log("Grog\nthe\tBold"), "Grog\\nthe\\tBold");
        let long = "x".repeat(200);
        let escaped = escape_log(&long);
        assert!(escaped.ends_with('…'));
        assert_eq!(escaped.chars().count(), MAX_PREVIEW + 1);
    }

    #[test]
    fn short_ids() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }
}
