use anyhow::Result;

use crate::config::MemgateConfig;
use crate::db::EmbeddingMeta;

/// Print memory statistics as JSON.
pub fn stats(config: &MemgateConfig, user_id: Option<&str>) -> Result<()> {
    let db_path = config.resolved_db_path();
    let meta = EmbeddingMeta {
        model: config.embedding.model.clone(),
        dimensions: config.embedding.dimensions,
    };
    let conn = crate::db::open_database(&db_path, &meta)?;

    let response = crate::memory::stats::memory_stats(&conn, user_id, Some(&db_path))?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
