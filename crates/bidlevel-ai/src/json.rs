//! Recover a JSON object from free-form model output.

use serde_json::Value;

/// Pull the JSON object out of a response that may be wrapped in markdown
/// fences or surrounded by prose.
pub fn extract_json_block(response: &str) -> Option<&str> {
    // ```json ... ```
    if let Some(start) = response.find("```json") {
        let after = &response[start + 7..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim());
        }
    }

    // ``` ... ```
    if let Some(start) = response.find("```") {
        let after = &response[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    // First { to last }
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Parse whatever object the response holds. Anything unparseable becomes
/// `Value::Null` so callers fall back to their defaults.
pub fn parse_json_lenient(response: &str) -> Value {
    let trimmed = response.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }
    extract_json_block(trimmed)
        .and_then(|block| serde_json::from_str::<Value>(block).ok())
        .filter(Value::is_object)
        .unwrap_or(Value::Null)
}
