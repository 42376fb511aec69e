//! Pure string-processing helpers for webhook fields.
//!
//! Mailgun delivers addresses in several shapes ("Display Name <addr>",
//! bare addresses, comma-joined lists) and message headers as a
//! JSON-encoded array of [name, value] pairs. These helpers normalize
//! all of them without ever failing.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

/// Extract a single email address.
///
/// `"Jane Doe <jane@example.com>"` yields `"jane@example.com"`; input
/// without angle brackets is returned trimmed; empty input yields an
/// empty string.
pub fn extract_email(input: &str) -> String {
    if let (Some(start), Some(end)) = (input.find('<'), input.rfind('>')) {
        if start < end {
            return input[start + 1..end].trim().to_string();
        }
    }
    input.trim().to_string()
}

/// Extract an ordered list of email addresses from a comma-joined value.
///
/// Empty entries are dropped, order is preserved, duplicates are kept.
pub fn extract_emails(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(extract_email)
        .filter(|addr| !addr.is_empty())
        .collect()
}

/// Strip angle brackets from a Message-ID value.
///
/// Returns `None` when the value is empty after stripping.
pub fn clean_message_id(raw: &str) -> Option<String> {
    let clean = raw.trim().trim_matches(|c| c == '<' || c == '>');
    if clean.is_empty() {
        None
    } else {
        Some(clean.to_string())
    }
}

/// Parse Mailgun's serialized message-headers field.
///
/// Mailgun provides headers as a JSON array of [name, value] pairs, e.g.
/// `[["Message-Id", "<abc123@example.com>"], ["Subject", "Hello"], ...]`.
/// Decode failure falls back to an empty list; this never errors.
pub fn parse_message_headers(raw: &str) -> Vec<(String, String)> {
    if raw.is_empty() {
        return Vec::new();
    }

    let parsed: Result<Vec<Vec<Value>>, _> = serde_json::from_str(raw);

    match parsed {
        Ok(entries) => entries
            .into_iter()
            .filter_map(|pair| {
                if pair.len() < 2 {
                    return None;
                }
                let name = pair[0].as_str()?.to_string();
                // Header values are normally strings, but tolerate anything
                // JSON can carry.
                let value = match &pair[1] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((name, value))
            })
            .collect(),
        Err(e) => {
            warn!(
                error = %e,
                headers_preview = truncate_preview(raw, 200),
                "mailgun_headers_parse_failed"
            );
            Vec::new()
        }
    }
}

/// Truncate a log preview to at most `max` bytes without splitting a
/// UTF-8 character.
fn truncate_preview(raw: &str, max: usize) -> &str {
    if raw.len() <= max {
        return raw;
    }
    let mut end = max;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}

/// Project a header pair list into a flat name→value map.
///
/// When multiple entries share a name, the later entry wins.
pub fn headers_to_map(pairs: &[(String, String)]) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        map.insert(name.clone(), value.clone());
    }
    map
}

/// Look up the first non-blank header value among the given name variants.
pub fn lookup_header<'a>(headers: &'a HashMap<String, String>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| headers.get(*name))
        .map(String::as_str)
        .find(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_email_display_name() {
        assert_eq!(
            extract_email("Jane Doe <jane@example.com>"),
            "jane@example.com"
        );
    }

    #[test]
    fn test_extract_email_bare_address() {
        assert_eq!(extract_email("jane@example.com"), "jane@example.com");
        assert_eq!(extract_email("  jane@example.com  "), "jane@example.com");
    }

    #[test]
    fn test_extract_email_empty() {
        assert_eq!(extract_email(""), "");
    }

    #[test]
    fn test_extract_emails_drops_empty_entries() {
        assert_eq!(
            extract_emails("a@x.com, b@y.com,, c@z.com"),
            vec!["a@x.com", "b@y.com", "c@z.com"]
        );
    }

    #[test]
    fn test_extract_emails_display_names_and_duplicates() {
        assert_eq!(
            extract_emails("A <a@x.com>, B <b@y.com>, a@x.com"),
            vec!["a@x.com", "b@y.com", "a@x.com"]
        );
    }

    #[test]
    fn test_clean_message_id() {
        assert_eq!(
            clean_message_id("<abc@example.com>"),
            Some("abc@example.com".to_string())
        );
        assert_eq!(
            clean_message_id("abc@example.com"),
            Some("abc@example.com".to_string())
        );
        assert_eq!(clean_message_id("<>"), None);
        assert_eq!(clean_message_id(""), None);
    }

    #[test]
    fn test_parse_message_headers() {
        let raw = r#"[["Message-Id", "<abc123@example.com>"], ["Subject", "Hello"]]"#;

        let pairs = parse_message_headers(raw);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "Message-Id");
        assert_eq!(pairs[0].1, "<abc123@example.com>");
    }

    #[test]
    fn test_parse_message_headers_invalid_json() {
        assert!(parse_message_headers("not valid json").is_empty());
        assert!(parse_message_headers("").is_empty());
    }

    #[test]
    fn test_parse_message_headers_multibyte_at_preview_boundary() {
        // Invalid JSON with a two-byte char straddling the 200-byte mark;
        // the failure log preview must not split it.
        let mut raw = "x".repeat(199);
        raw.push('é');
        raw.push_str(&"y".repeat(50));

        assert!(parse_message_headers(&raw).is_empty());
    }

    #[test]
    fn test_truncate_preview_char_boundary() {
        let mut raw = "x".repeat(199);
        raw.push('é');
        raw.push_str(&"y".repeat(50));

        let preview = truncate_preview(&raw, 200);
        assert_eq!(preview.len(), 199);
        assert!(preview.chars().all(|c| c == 'x'));

        assert_eq!(truncate_preview("short", 200), "short");
        assert_eq!(truncate_preview("ééé", 3), "é");
    }

    #[test]
    fn test_parse_message_headers_short_pairs_skipped() {
        let raw = r#"[["Lonely"], ["Subject", "Hi"]]"#;

        let pairs = parse_message_headers(raw);

        assert_eq!(pairs, vec![("Subject".to_string(), "Hi".to_string())]);
    }

    #[test]
    fn test_headers_to_map_last_write_wins() {
        let pairs = vec![
            ("X-Tag".to_string(), "first".to_string()),
            ("Subject".to_string(), "Hi".to_string()),
            ("X-Tag".to_string(), "second".to_string()),
        ];

        let map = headers_to_map(&pairs);

        assert_eq!(map.get("X-Tag").map(String::as_str), Some("second"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_lookup_header_variants() {
        let map = headers_to_map(&[("TO".to_string(), "a@b.com".to_string())]);

        assert_eq!(lookup_header(&map, &["To", "TO"]), Some("a@b.com"));
        assert_eq!(lookup_header(&map, &["Cc", "CC"]), None);
    }
}
