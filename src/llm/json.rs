//! Pulling a JSON object out of free-form model output.

/// Strip markdown fences and surrounding prose from model output,
/// returning the best candidate for a JSON object.
///
/// Falls back to the trimmed input when no object bounds are found, so
/// the caller's parse error still shows what the model said.
pub fn extract_json_text(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

/// Parse model output as a JSON object, tolerating fences and prose.
pub fn parse_json_object(text: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(&extract_json_text(text)) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}
