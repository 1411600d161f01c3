// agent/sensors/snippet.rs
// Redaction-safe HTML snippets and value truncation.

use regex::Regex;
use std::sync::OnceLock;

const REDACTED: &str = "[redacted]";

fn double_quoted_value() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)value="[^"]*""#).expect("static pattern"))
}

fn single_quoted_value() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)value='[^']*'").expect("static pattern"))
}

fn style_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("static pattern")
    })
}

/// Keep at most `limit` characters, marking the cut with `...`.
pub fn truncate(value: &str, limit: usize) -> String {
    match value.char_indices().nth(limit) {
        None => value.to_string(),
        Some((cut, _)) => format!("{}...", &value[..cut]),
    }
}

/// Scrub `value` attributes (form contents, tokens) then truncate.
pub fn sanitize_snippet(html: &str, limit: usize) -> String {
    let scrubbed = double_quoted_value().replace_all(html, format!("value=\"{}\"", REDACTED));
    let scrubbed = single_quoted_value().replace_all(&scrubbed, format!("value='{}'", REDACTED));
    truncate(&scrubbed, limit)
}

/// Redact the value of the `value` attribute itself, truncate anything else.
pub fn safe_attribute_value(attribute: &str, value: Option<&str>, limit: usize) -> String {
    if attribute.eq_ignore_ascii_case("value") {
        return REDACTED.to_string();
    }
    truncate(value.unwrap_or_default(), limit)
}

/// `url(...)` references inside an inline style.
pub fn style_urls(style: &str) -> Vec<String> {
    style_url()
        .captures_iter(style)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("", 3), "");
        // multi-byte characters are counted, not bytes
        assert_eq!(truncate("ééééé", 2), "éé...");
    }

    #[test]
    fn test_sanitize_redacts_values() {
        let html = r#"<input type="password" VALUE="hunter2"><input value='secret'>"#;
        let out = sanitize_snippet(html, 220);
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("secret"));
        assert!(out.contains(r#"value="[redacted]""#));
        assert!(out.contains("value='[redacted]'"));
    }

    #[test]
    fn test_sanitize_truncates() {
        let html = format!("<div>{}</div>", "x".repeat(500));
        let out = sanitize_snippet(&html, 220);
        assert_eq!(out.chars().count(), 223);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_safe_attribute_value() {
        assert_eq!(safe_attribute_value("value", Some("pin"), 10), "[redacted]");
        assert_eq!(safe_attribute_value("href", None, 10), "");
        assert_eq!(safe_attribute_value("src", Some("abcdefghijkl"), 4), "abcd...");
    }

    #[test]
    fn test_style_urls() {
        let style = "background: url('moz-extension://abc/bg.png'); mask: URL(x.svg)";
        assert_eq!(
            style_urls(style),
            vec!["moz-extension://abc/bg.png".to_string(), "x.svg".to_string()]
        );
    }
}
