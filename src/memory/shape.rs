//! Normalization of memory records produced by memory-store servers.
//!
//! Exported or proxied records arrive in several shapes:
//!
//! - a bare list of objects, or of plain strings
//! - `{"results": [...]}`
//! - a single object carrying `memory`, `content`, or `id`
//!
//! [`normalize_records`] folds all of them into [`MemoryRecord`]s.

use serde_json::{Map, Value};

use super::types::MemoryRecord;

/// Turn any supported shape into typed records.
///
/// Missing ids get a fresh UUID, `memory` falls back to `content`, missing
/// timestamps become now, and `user_id` falls back to `default_user`. Entries
/// with no text are dropped; unrecognised shapes yield nothing.
pub fn normalize_records(value: &Value, default_user: &str) -> Vec<MemoryRecord> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| normalize_item(item, default_user))
            .collect(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(m) => from_object(m, default_user),
                    _ => None,
                })
                .collect(),
            _ if ["memory", "content", "id"].iter().any(|k| map.contains_key(*k)) => {
                from_object(map, default_user).into_iter().collect()
            }
            _ => vec![],
        },
        _ => vec![],
    }
}

fn normalize_item(item: &Value, default_user: &str) -> Option<MemoryRecord> {
    match item {
        Value::Object(map) => from_object(map, default_user),
        Value::String(text) => fresh_record(text, default_user, Value::Object(Map::new())),
        _ => None,
    }
}

fn from_object(map: &Map<String, Value>, default_user: &str) -> Option<MemoryRecord> {
    let text = str_field(map, "memory").or_else(|| str_field(map, "content"))?;
    let user_id = str_field(map, "user_id").unwrap_or(default_user);
    let metadata = match map.get("metadata") {
        Some(m @ Value::Object(_)) => m.clone(),
        _ => Value::Object(Map::new()),
    };

    let mut record = fresh_record(text, user_id, metadata)?;
    if let Some(id) = str_field(map, "id") {
        record.id = id.to_string();
    }
    record.agent_id = str_field(map, "agent_id").map(String::from);
    if let Some(created_at) = str_field(map, "created_at") {
        record.created_at = created_at.to_string();
    }
    record.updated_at = str_field(map, "updated_at").map(String::from);
    Some(record)
}

fn fresh_record(text: &str, user_id: &str, metadata: Value) -> Option<MemoryRecord> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(MemoryRecord {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        agent_id: None,
        content: text.to_string(),
        metadata,
        created_at: chrono::Utc::now().to_rfc3339(),
        updated_at: None,
    })
}

/// Non-empty string field.
fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
