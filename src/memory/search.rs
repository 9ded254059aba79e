//! Read path: vector search, listing, and lookup by id.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

use super::types::{MemoryRecord, SearchHit};
use super::{embedding_to_bytes, l2_to_cosine};

/// KNN candidates fetched per requested result before owner filtering.
const OVERFETCH: usize = 4;
/// Upper bound on `k` accepted by vec0, and so on results per search.
pub const MAX_KNN: usize = 4096;

const RECORD_COLUMNS: &str = "id, user_id, agent_id, content, metadata, created_at, updated_at";

fn record_from_row(row: &Row) -> rusqlite::Result<MemoryRecord> {
    let metadata: Option<String> = row.get(4)?;
    Ok(MemoryRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        agent_id: row.get(2)?,
        content: row.get(3)?,
        metadata: metadata
            .and_then(|m| serde_json::from_str(&m).ok())
            .unwrap_or(serde_json::Value::Object(Default::default())),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Fetch a single memory by id.
pub fn get_memory(conn: &Connection, id: &str) -> Result<Option<MemoryRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM memories WHERE id = ?1"),
            params![id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

/// A user's memories, newest first, optionally narrowed to one agent.
pub fn list_memories(
    conn: &Connection,
    user_id: &str,
    agent_id: Option<&str>,
    limit: usize,
) -> Result<Vec<MemoryRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM memories \
         WHERE user_id = ?1 AND (?2 IS NULL OR agent_id = ?2) \
         ORDER BY created_at DESC, rowid DESC LIMIT ?3"
    ))?;
    let records = stmt
        .query_map(
            params![user_id, agent_id, i64::try_from(limit).unwrap_or(i64::MAX)],
            record_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Nearest memories to `query_embedding` owned by `user_id` (and `agent_id`,
/// when given), closest first.
pub fn search_memories(
    conn: &Connection,
    query_embedding: &[f32],
    user_id: &str,
    agent_id: Option<&str>,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    if limit == 0 {
        return Ok(vec![]);
    }
    let k = limit.saturating_mul(OVERFETCH).clamp(20, MAX_KNN);

    let mut stmt = conn.prepare(
        "SELECT id, distance FROM memories_vec WHERE embedding MATCH ?1 AND k = ?2 ORDER BY distance",
    )?;
    let candidates: Vec<(String, f64)> = stmt
        .query_map(params![embedding_to_bytes(query_embedding), k as i64], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let ids: Vec<&str> = candidates.iter().map(|(id, _)| id.as_str()).collect();
    let mut records = fetch_records(conn, &ids)?;

    let hits = candidates
        .iter()
        .filter_map(|(id, distance)| {
            let record = records.remove(id.as_str())?;
            let owned = record.user_id == user_id
                && agent_id.map_or(true, |a| record.agent_id.as_deref() == Some(a));
            owned.then(|| SearchHit {
                record,
                score: l2_to_cosine(*distance),
                distance: *distance,
            })
        })
        .take(limit)
        .collect();

    Ok(hits)
}

/// Batch-fetch records by id.
fn fetch_records(conn: &Connection, ids: &[&str]) -> Result<HashMap<String, MemoryRecord>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = (1..=ids.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM memories WHERE id IN ({placeholders})"
    ))?;
    let records = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), record_from_row)?
        .map(|r| r.map(|record| (record.id.clone(), record)))
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(records)
}
