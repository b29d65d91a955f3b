//! Free-text parsing at the completion-service boundary.
//!
//! Every function here returns `Option` and never panics on model output:
//! callers pick the degraded default explicitly when parsing fails.

use super::router::RouteName;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

static ROUTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)ROUTE[*_`]*\s*:[\s*_`"'<\[]*([a-z_]+)"#).expect("route pattern is valid")
});

/// Marker that turns a refined command into a final answer.
pub const FINAL_ANSWER_MARKER: &str = "FINAL ANSWER:";

/// Strip a surrounding Markdown code fence (```json ... ```), if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = match body.find('\n') {
        Some(newline) => &body[newline + 1..],
        None => body,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a reply as JSON of type `T`.
///
/// Tries the reply as-is (minus any code fence) first, then the span between
/// the first `open` and the last `close` delimiter, so prose around the JSON
/// is tolerated.
fn parse_json_between<T: DeserializeOwned>(reply: &str, open: char, close: char) -> Option<T> {
    let body = strip_code_fence(reply);
    if let Ok(value) = serde_json::from_str(body) {
        return Some(value);
    }
    let start = body.find(open)?;
    let end = body.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

/// Parse a reply expected to hold a single JSON object.
pub fn parse_json_object<T: DeserializeOwned>(reply: &str) -> Option<T> {
    parse_json_between(reply, '{', '}')
}

/// Parse a reply expected to hold a JSON array.
pub fn parse_json_array<T: DeserializeOwned>(reply: &str) -> Option<Vec<T>> {
    parse_json_between(reply, '[', ']')
}

/// Extract the route named on a `ROUTE: <token>` line.
///
/// The label and token are case-insensitive. Tokens that do not name a known
/// route are skipped; `None` means no usable route was found.
pub fn parse_route(reply: &str) -> Option<RouteName> {
    ROUTE_LINE
        .captures_iter(reply)
        .filter_map(|caps| caps.get(1))
        .find_map(|token| token.as_str().to_lowercase().parse().ok())
}

/// Whether a refined command is a final answer.
///
/// Leading/trailing whitespace is ignored and the marker is case-insensitive.
pub fn is_final_answer(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed
        .get(..FINAL_ANSWER_MARKER.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(FINAL_ANSWER_MARKER))
}

/// Remove thousands-separator commas inside digit runs ("1,234,567" -> "1234567").
///
/// A comma is dropped only when it sits directly between two ASCII digits.
pub fn normalize_digit_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ','
            && i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|next| next.is_ascii_digit())
        {
            continue;
        }
        out.push(c);
    }
    out
}
