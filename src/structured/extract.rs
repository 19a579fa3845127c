//! JSON extraction from free-form model text.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*\n(.*?)```").expect("fence pattern is valid")
});

/// Returns the JSON text embedded in `text`, if any.
///
/// A fenced block is preferred when present. Otherwise the span from the first `{`
/// to the last `}` is taken, or the first `[` to the last `]` for a bare file array.
pub fn extract_json(text: &str) -> Option<&str> {
    let body = FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim();

    span(body, '{', '}').or_else(|| span(body, '[', ']'))
}

fn span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
