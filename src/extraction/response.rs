//! Parsing of the collaborator's free-form reply.

use serde_json::Value;

use crate::entries::types::{Entry, ValidationError};

/// Items recovered from one reply.
#[derive(Debug, Default)]
pub struct ParsedResponse {
    pub entries: Vec<Entry>,
    /// Items present in the reply, valid or not.
    pub found: usize,
    pub rejected: usize,
    pub summary: Option<String>,
}

/// Extract the JSON object from a reply that may be wrapped in markdown
/// fences or surrounded by prose.
pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<Value>(strip_fences(trimmed)) {
        return v.is_object().then_some(v);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end])
        .ok()
        .filter(Value::is_object)
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") up to the first newline
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse `{"extractions": [...], "summary": ...}`. Each item is validated on
/// its own; a bad item never discards its siblings.
pub fn parse_response(raw: &str) -> Option<ParsedResponse> {
    let doc = extract_json(raw)?;
    let mut parsed = ParsedResponse {
        summary: doc
            .get("summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        ..ParsedResponse::default()
    };

    let items: &[Value] = match doc.get("extractions") {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };
    for item in items {
        parsed.found += 1;
        match item_to_entry(item) {
            Ok(entry) => parsed.entries.push(entry),
            Err(e) => {
                tracing::debug!(error = %e, "rejected extraction item");
                parsed.rejected += 1;
            }
        }
    }
    Some(parsed)
}

fn item_to_entry(item: &Value) -> Result<Entry, ValidationError> {
    // Unlike hook payloads, extracted items must state their importance.
    if matches!(item.get("importance"), None | Some(Value::Null)) {
        if !item.is_object() {
            return Err(ValidationError::NotAnObject);
        }
        return Err(ValidationError::MissingField("importance"));
    }
    Entry::from_value(item)
}
