//! Write path: deduplication, storage, and history.
//!
//! [`add_memory`] is the single entry point. It runs inside a transaction:
//! dedup check via vector similarity against the same user's memories, then
//! insert into `memories` and `memories_vec`, then a history row.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::search::get_memory;
use super::types::{AddResult, NewMemory};
use super::{cosine_threshold_to_l2, embedding_to_bytes};
use crate::db::migrations::get_embedding_dimensions;

/// Nearest neighbours inspected for a dedup match.
const DEDUP_CANDIDATES: usize = 20;

/// Full write path: validate → dedup check → insert or touch → history.
///
/// `dedup_threshold` is a cosine similarity; `1.0` disables dedup.
pub fn add_memory(
    conn: &mut Connection,
    memory: &NewMemory,
    embedding: &[f32],
    dedup_threshold: f64,
) -> Result<AddResult> {
    let content = memory.content.trim();
    if content.is_empty() {
        bail!("memory content is empty");
    }
    if let Some(dims) = get_embedding_dimensions(conn)? {
        if embedding.len() != dims {
            bail!(
                "embedding has {} dimensions, database expects {dims}",
                embedding.len()
            );
        }
    }
    let metadata_json = match &memory.metadata {
        serde_json::Value::Null => None,
        serde_json::Value::Object(_) => Some(memory.metadata.to_string()),
        other => bail!("metadata must be a JSON object, got {other}"),
    };

    let tx = conn.transaction()?;

    if dedup_threshold < 1.0 {
        if let Some(existing_id) = check_dedup(&tx, &memory.user_id, embedding, dedup_threshold)? {
            let now = chrono::Utc::now().to_rfc3339();
            tx.execute(
                "UPDATE memories SET updated_at = ?1 WHERE id = ?2",
                params![now, existing_id],
            )?;
            write_history(&tx, &existing_id, "UPDATE", Some(content))?;
            let record = get_memory(&tx, &existing_id)?
                .with_context(|| format!("dedup match vanished: {existing_id}"))?;
            tx.commit()?;
            tracing::debug!(id = %existing_id, user_id = %memory.user_id, "deduplicated memory");
            return Ok(AddResult {
                deduplicated: true,
                record,
            });
        }
    }

    let id = memory
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    let now = chrono::Utc::now().to_rfc3339();
    let created_at = memory.created_at.as_deref().unwrap_or(&now);

    tx.execute(
        "INSERT INTO memories (id, user_id, agent_id, content, metadata, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, memory.user_id, memory.agent_id, content, metadata_json, created_at, now],
    )?;
    tx.execute(
        "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
        params![id, embedding_to_bytes(embedding)],
    )?;
    write_history(&tx, &id, "ADD", Some(content))?;

    let record = get_memory(&tx, &id)?.with_context(|| format!("inserted memory missing: {id}"))?;
    tx.commit()?;

    Ok(AddResult {
        deduplicated: false,
        record,
    })
}

/// Find an existing memory of the same user within the similarity threshold.
fn check_dedup(
    tx: &Transaction,
    user_id: &str,
    embedding: &[f32],
    threshold: f64,
) -> Result<Option<String>> {
    let max_distance = cosine_threshold_to_l2(threshold);

    let mut stmt = tx.prepare(
        "SELECT id, distance FROM memories_vec WHERE embedding MATCH ?1 AND k = ?2 ORDER BY distance",
    )?;
    let candidates: Vec<(String, f64)> = stmt
        .query_map(
            params![embedding_to_bytes(embedding), DEDUP_CANDIDATES as i64],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;

    for (candidate_id, distance) in candidates {
        // ordered by distance
        if distance > max_distance {
            break;
        }
        let owner: Option<String> = tx
            .query_row(
                "SELECT user_id FROM memories WHERE id = ?1",
                params![candidate_id],
                |row| row.get(0),
            )
            .optional()?;
        if owner.as_deref() == Some(user_id) {
            return Ok(Some(candidate_id));
        }
    }

    Ok(None)
}

/// Append a row to `memory_history`.
pub(crate) fn write_history(
    conn: &Connection,
    memory_id: &str,
    event: &str,
    content: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO memory_history (memory_id, event, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![memory_id, event, content, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_memory_database, EmbeddingMeta};

    const DIMS: usize = 8;

    fn test_db() -> Connection {
        open_memory_database(&EmbeddingMeta {
            model: "test".into(),
            dimensions: DIMS,
        })
        .unwrap()
    }

    fn unit(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        v[axis] = 1.0;
        v
    }

    /// Cosine ~0.997 with `unit(0)`.
    fn near_unit0() -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        v[0] = 0.99;
        v[1] = 0.07;
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter_mut().for_each(|x| *x /= norm);
        v
    }

    fn new_memory(user: &str, content: &str) -> NewMemory {
        NewMemory {
            user_id: user.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    fn history_events(conn: &Connection, id: &str) -> Vec<String> {
        conn.prepare("SELECT event FROM memory_history WHERE memory_id = ?1 ORDER BY id")
            .unwrap()
            .query_map(params![id], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_add_new_memory() {
        let mut conn = test_db();
        let mut memory = new_memory("alice", "  prefers dark mode  ");
        memory.metadata = serde_json::json!({"source": "screen"});

        let result = add_memory(&mut conn, &memory, &unit(0), 0.95).unwrap();

        assert!(!result.deduplicated);
        assert_eq!(result.record.content, "prefers dark mode");
        assert_eq!(result.record.user_id, "alice");
        assert_eq!(result.record.metadata["source"], "screen");

        let vec_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memories_vec WHERE id = ?1",
                params![result.record.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(vec_count, 1);
        assert_eq!(history_events(&conn, &result.record.id), vec!["ADD"]);
    }

    #[test]
    fn test_dedup_same_user() {
        let mut conn = test_db();
        let first = add_memory(&mut conn, &new_memory("alice", "likes tea"), &unit(0), 0.95).unwrap();
        let second =
            add_memory(&mut conn, &new_memory("alice", "likes tea a lot"), &near_unit0(), 0.95)
                .unwrap();

        assert!(second.deduplicated);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(history_events(&conn, &first.record.id), vec!["ADD", "UPDATE"]);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_no_dedup_across_users() {
        let mut conn = test_db();
        add_memory(&mut conn, &new_memory("alice", "likes tea"), &unit(0), 0.95).unwrap();
        let bob = add_memory(&mut conn, &new_memory("bob", "likes tea"), &unit(0), 0.95).unwrap();
        assert!(!bob.deduplicated);
    }

    #[test]
    fn test_no_dedup_for_distant_vectors() {
        let mut conn = test_db();
        add_memory(&mut conn, &new_memory("alice", "likes tea"), &unit(0), 0.95).unwrap();
        let other = add_memory(&mut conn, &new_memory("alice", "owns a bike"), &unit(3), 0.95).unwrap();
        assert!(!other.deduplicated);
    }

    #[test]
    fn test_threshold_one_disables_dedup() {
        let mut conn = test_db();
        add_memory(&mut conn, &new_memory("alice", "likes tea"), &unit(0), 1.0).unwrap();
        let again = add_memory(&mut conn, &new_memory("alice", "likes tea"), &unit(0), 1.0).unwrap();
        assert!(!again.deduplicated);
    }

    #[test]
    fn test_rejects_empty_content() {
        let mut conn = test_db();
        let err = add_memory(&mut conn, &new_memory("alice", "   "), &unit(0), 0.95).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_rejects_wrong_dimension() {
        let mut conn = test_db();
        let err = add_memory(&mut conn, &new_memory("alice", "x"), &[1.0, 0.0], 0.95).unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn test_rejects_non_object_metadata() {
        let mut conn = test_db();
        let mut memory = new_memory("alice", "x");
        memory.metadata = serde_json::json!(["not", "an", "object"]);
        assert!(add_memory(&mut conn, &memory, &unit(0), 0.95).is_err());
    }

    #[test]
    fn test_preserves_imported_id_and_timestamp() {
        let mut conn = test_db();
        let mut memory = new_memory("alice", "imported");
        memory.id = Some("legacy-1".into());
        memory.created_at = Some("2024-05-01T12:00:00+00:00".into());

        let result = add_memory(&mut conn, &memory, &unit(2), 1.0).unwrap();
        assert_eq!(result.record.id, "legacy-1");
        assert_eq!(result.record.created_at, "2024-05-01T12:00:00+00:00");
    }
}
