//! CLI `doctor` command: database diagnostics plus backend reachability.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};

use super::{format_bytes, probe_backend};
use crate::config::{BackendConfig, MemgateConfig};
use crate::db;

/// Run diagnostics and print a health report.
pub async fn doctor(config: &MemgateConfig) -> Result<()> {
    println!("memgate Health Report");
    println!("=====================");
    println!();

    database_report(config)?;

    println!();
    println!("Backends:");
    if config.classifier.enabled {
        print_probe("Classifier", &config.classifier.backend()).await;
    } else {
        println!("  Classifier:      disabled (memories stored unfiltered)");
    }
    if config.chat.enabled {
        print_probe("Chat", &config.chat.backend()).await;
    } else {
        println!("  Chat:            disabled");
    }
    if config.embedding.provider == "remote" {
        println!("  Embeddings:      remote at {}", config.embedding.base_url);
    } else {
        let cache_dir = crate::config::expand_tilde(&config.embedding.cache_dir);
        let present = cache_dir.join("model.onnx").exists() && cache_dir.join("tokenizer.json").exists();
        println!(
            "  Embeddings:      local ({})",
            if present { "model files present" } else { "model missing; run `memgate model download`" }
        );
    }

    Ok(())
}

fn database_report(config: &MemgateConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `memgate serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    // Opened without schema setup so a dimension mismatch is reported, not fatal.
    db::load_sqlite_vec();
    let conn = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.embedding.model);
    match report.embedding_model {
        Some(ref stored) if stored != &config.embedding.model => {
            println!("  WARNING: model mismatch! Search quality will suffer.");
        }
        Some(_) => println!("  Status:          OK (match)"),
        None => {}
    }
    if let Some(stored) = report.embedding_dimensions {
        if stored == config.embedding.dimensions {
            println!("  Dimensions:      {stored}");
        } else {
            println!(
                "  ERROR: database has {stored} dimensions, config has {}. The server will refuse to start.",
                config.embedding.dimensions
            );
        }
    }
    println!();
    println!("Row counts:");
    println!("  Memories:        {}", report.memory_count);
    println!("  Vectors:         {}", report.vector_count);
    println!("  History:         {}", report.history_count);
    if report.memory_count != report.vector_count {
        println!("  WARNING: memory and vector counts differ");
    }
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or start fresh and re-import an export with `memgate import <file>`");
    }
    Ok(())
}

async fn print_probe(label: &str, backend: &BackendConfig) {
    let label = format!("{label}:");
    match probe_backend(backend).await {
        Ok(report) if report.models.is_empty() => {
            println!("  {label:<16} OK ({} at {})", report.profile.display_name(), report.url);
        }
        Ok(report) => {
            println!(
                "  {label:<16} OK ({} at {}, {} model(s): {})",
                report.profile.display_name(),
                report.url,
                report.models.len(),
                report.models.join(", ")
            );
        }
        Err(e) => println!("  {label:<16} UNREACHABLE ({e})"),
    }
}
