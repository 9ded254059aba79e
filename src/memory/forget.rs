//! Memory deletion.
//!
//! Deletes are hard: the row and its vector are removed and a `DELETE` event
//! stays behind in `memory_history`.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::write_history;

/// Delete one memory. Returns `false` if the id is unknown.
pub fn delete_memory(conn: &mut Connection, memory_id: &str) -> Result<bool> {
    let tx = conn.transaction()?;

    let content: Option<String> = tx
        .query_row(
            "SELECT content FROM memories WHERE id = ?1",
            params![memory_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(content) = content else {
        return Ok(false);
    };

    tx.execute("DELETE FROM memories_vec WHERE id = ?1", params![memory_id])?;
    tx.execute("DELETE FROM memories WHERE id = ?1", params![memory_id])?;
    write_history(&tx, memory_id, "DELETE", Some(&content))?;

    tx.commit()?;
    tracing::info!(id = %memory_id, "memory deleted");
    Ok(true)
}

/// Delete every memory owned by `user_id`. Returns the number removed.
pub fn delete_all(conn: &mut Connection, user_id: &str) -> Result<usize> {
    let tx = conn.transaction()?;

    let ids: Vec<String> = tx
        .prepare("SELECT id FROM memories WHERE user_id = ?1")?
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    for id in &ids {
        tx.execute("DELETE FROM memories_vec WHERE id = ?1", params![id])?;
        write_history(&tx, id, "DELETE", None)?;
    }
    tx.execute("DELETE FROM memories WHERE user_id = ?1", params![user_id])?;

    tx.commit()?;
    tracing::info!(user_id = %user_id, count = ids.len(), "deleted all memories for user");
    Ok(ids.len())
}
