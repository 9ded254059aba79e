pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

pub use migrations::EmbeddingMeta;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the memgate database at the given path, with all
/// extensions loaded, schema initialized, and migrations applied.
///
/// Fails if the database was built for a different embedding dimension.
pub fn open_database(path: impl AsRef<Path>, embedding: &EmbeddingMeta) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    let conn = prepare(conn, embedding)?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open a fully initialized in-memory database.
pub fn open_memory_database(embedding: &EmbeddingMeta) -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    prepare(conn, embedding)
}

fn prepare(mut conn: Connection, embedding: &EmbeddingMeta) -> Result<Connection> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn, embedding.dimensions).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn, embedding).context("failed to run migrations")?;
    verify_embedding_meta(&conn, embedding)?;
    Ok(conn)
}

/// Compare stored embedding settings against the configured ones.
/// A dimension mismatch is fatal; a model mismatch only degrades search quality.
fn verify_embedding_meta(conn: &Connection, embedding: &EmbeddingMeta) -> Result<()> {
    if let Some(stored) = migrations::get_embedding_dimensions(conn)? {
        anyhow::ensure!(
            stored == embedding.dimensions,
            "database vectors have {stored} dimensions but embedding.dimensions is {}; \
             use a new db_path or restore the previous embedding settings",
            embedding.dimensions
        );
    }
    if let Some(stored) = migrations::get_embedding_model(conn)? {
        if stored != embedding.model {
            tracing::warn!(
                stored = %stored,
                configured = %embedding.model,
                "embedding model differs from the one the database was built with"
            );
        }
    }
    Ok(())
}

/// Result of [`check_database_health`].
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<usize>,
    pub memory_count: u64,
    pub vector_count: u64,
    pub history_count: u64,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

/// Run integrity and consistency checks over an open database.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String = conn
        .query_row("PRAGMA integrity_check", [], |r| r.get(0))
        .context("integrity_check failed")?;
    let sqlite_vec_version: String = conn.query_row("SELECT vec_version()", [], |r| r.get(0))?;

    let count = |sql: &str| -> Result<u64> {
        let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
        Ok(n as u64)
    };

    Ok(HealthReport {
        schema_version: migrations::get_schema_version(conn)?,
        sqlite_vec_version,
        embedding_model: migrations::get_embedding_model(conn)?,
        embedding_dimensions: migrations::get_embedding_dimensions(conn)?,
        memory_count: count("SELECT COUNT(*) FROM memories")?,
        vector_count: count("SELECT COUNT(*) FROM memories_vec")?,
        history_count: count("SELECT COUNT(*) FROM memory_history")?,
        integrity_ok: integrity_details == "ok",
        integrity_details,
    })
}
