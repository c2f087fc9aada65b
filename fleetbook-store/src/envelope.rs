use fleetbook_core::{CoreError, CoreResult};
use serde_json::Value;

/// Keys a listing endpoint may wrap its records under
const LIST_KEYS: &[&str] = &["data", "tickets", "results"];

/// Accepts a bare array or an object wrapping one under a known key.
pub fn unwrap_list(origin: &str, body: Value) -> CoreResult<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => LIST_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| CoreError::SourceUnavailable {
                origin: origin.to_string(),
                reason: "response object carries no record list".to_string(),
            }),
        other => Err(CoreError::SourceUnavailable {
            origin: origin.to_string(),
            reason: format!("unexpected response shape: {}", shape(&other)),
        }),
    }
}

/// Held seat labels; a non-list body means nothing is held.
pub fn seat_labels(body: Value) -> Vec<String> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(_) => unwrap_list("holds", body).unwrap_or_default(),
        _ => Vec::new(),
    };
    items.iter().filter_map(seat_label).collect()
}

fn seat_label(item: &Value) -> Option<String> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["seat_number", "seat", "label"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(seat_label),
        _ => None,
    }
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
