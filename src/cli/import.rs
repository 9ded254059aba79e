use anyhow::{Context, Result};
use std::path::Path;

use crate::config::MemgateConfig;
use crate::memory::shape::normalize_records;
use crate::service::MemoryService;

/// Import memories from a JSON file.
///
/// Accepts a list of records or strings, a `{"results": [...]}` wrapper, or a
/// single record. Each memory is re-embedded; ids that already exist are
/// skipped. The gate and dedup are bypassed.
pub async fn import(config: &MemgateConfig, file: &Path, user_id: Option<&str>) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&json).context("failed to parse import JSON")?;

    let default_user = user_id.unwrap_or(&config.storage.default_user);
    let records = normalize_records(&value, default_user);
    anyhow::ensure!(!records.is_empty(), "no memories found in {}", file.display());

    let service = MemoryService::from_config(config)?;
    println!("Importing {} memories...", records.len());
    let summary = service.import(records).await?;

    println!("Import complete:");
    println!("  Memories imported: {}", summary.imported);
    println!("  Memories skipped:  {} (already exist)", summary.skipped);
    Ok(())
}
