use anyhow::Result;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Response from [`memory_stats`].
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_memories: u64,
    pub by_user: BTreeMap<String, u64>,
    /// Event counts from `memory_history` (`ADD`, `UPDATE`, `DELETE`).
    pub history: BTreeMap<String, u64>,
    pub db_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_memory: Option<String>,
}

/// Compute memory store statistics.
///
/// If `user_id` is provided, memory counts and time range are filtered to that
/// user; history counts always cover the whole store.
/// `db_path` is used for file size calculation; pass None for in-memory databases.
pub fn memory_stats(
    conn: &Connection,
    user_id: Option<&str>,
    db_path: Option<&Path>,
) -> Result<StatsResponse> {
    let by_user = count_by_user(conn, user_id)?;
    let history = count_history(conn)?;
    let (oldest_memory, newest_memory) = memory_time_range(conn, user_id)?;

    let db_size_bytes = db_path
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(StatsResponse {
        total_memories: by_user.values().sum(),
        by_user,
        history,
        db_size_bytes,
        oldest_memory,
        newest_memory,
    })
}

fn count_by_user(conn: &Connection, user_id: Option<&str>) -> Result<BTreeMap<String, u64>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, COUNT(*) FROM memories WHERE ?1 IS NULL OR user_id = ?1 GROUP BY user_id",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(rows)
}

fn count_history(conn: &Connection) -> Result<BTreeMap<String, u64>> {
    let mut map: BTreeMap<String, u64> = ["ADD", "UPDATE", "DELETE"]
        .iter()
        .map(|e| (e.to_string(), 0))
        .collect();

    let mut stmt = conn.prepare("SELECT event, COUNT(*) FROM memory_history GROUP BY event")?;
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (event, count) in rows {
        map.insert(event, count as u64);
    }
    Ok(map)
}

/// Oldest and newest memory timestamps.
fn memory_time_range(
    conn: &Connection,
    user_id: Option<&str>,
) -> Result<(Option<String>, Option<String>)> {
    let range = conn.query_row(
        "SELECT MIN(created_at), MAX(created_at) FROM memories WHERE ?1 IS NULL OR user_id = ?1",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_memory_database, EmbeddingMeta};
    use crate::memory::forget::delete_memory;
    use crate::memory::store::add_memory;
    use crate::memory::NewMemory;

    fn test_db() -> Connection {
        open_memory_database(&EmbeddingMeta {
            model: "test".into(),
            dimensions: 2,
        })
        .unwrap()
    }

    fn add(conn: &mut Connection, user: &str, content: &str) -> String {
        let memory = NewMemory {
            user_id: user.into(),
            content: content.into(),
            ..Default::default()
        };
        add_memory(conn, &memory, &[0.0, 1.0], 1.0).unwrap().record.id
    }

    #[test]
    fn stats_on_empty_store() {
        let conn = test_db();
        let stats = memory_stats(&conn, None, None).unwrap();
        assert_eq!(stats.total_memories, 0);
        assert!(stats.by_user.is_empty());
        assert_eq!(stats.history["ADD"], 0);
        assert!(stats.oldest_memory.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn stats_count_users_and_history() {
        let mut conn = test_db();
        add(&mut conn, "alice", "one");
        let gone = add(&mut conn, "alice", "two");
        add(&mut conn, "bob", "three");
        delete_memory(&mut conn, &gone).unwrap();

        let stats = memory_stats(&conn, None, None).unwrap();
        assert_eq!(stats.total_memories, 2);
        assert_eq!(stats.by_user["alice"], 1);
        assert_eq!(stats.by_user["bob"], 1);
        assert_eq!(stats.history["ADD"], 3);
        assert_eq!(stats.history["DELETE"], 1);
        assert!(stats.newest_memory >= stats.oldest_memory);
    }

    #[test]
    fn stats_filtered_by_user() {
        let mut conn = test_db();
        add(&mut conn, "alice", "one");
        add(&mut conn, "bob", "two");

        let stats = memory_stats(&conn, Some("bob"), None).unwrap();
        assert_eq!(stats.total_memories, 1);
        assert!(!stats.by_user.contains_key("alice"));
    }
}
