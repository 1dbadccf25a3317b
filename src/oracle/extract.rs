//! Extraction of structured content from raw completion text.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn json_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)```").expect("valid regex"))
}

/// Parse completion text as JSON.
///
/// The whole text is tried first, then the first fenced block.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Some(value);
    }
    json_fence()
        .captures(text)
        .and_then(|captures| serde_json::from_str(captures[1].trim()).ok())
}

/// Body of the first fenced code block tagged with `language`.
pub fn extract_code(text: &str, language: &str) -> Option<String> {
    let pattern = format!(r"(?s)```{}(.*?)```", regex::escape(language));
    let fence = Regex::new(&pattern).ok()?;
    fence
        .captures(text)
        .map(|captures| captures[1].trim().to_string())
}
