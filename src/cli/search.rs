use anyhow::Result;

use crate::config::MemgateConfig;
use crate::service::MemoryService;

/// Run a search from the terminal.
pub async fn search(
    config: &MemgateConfig,
    query: &str,
    user_id: Option<&str>,
    limit: usize,
) -> Result<()> {
    let service = MemoryService::from_config(config)?;
    let hits = service.search(query, user_id, None, limit).await?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        let content = &hit.record.content;
        let preview = if content.chars().count() > 120 {
            format!("{}...", crate::classifier::truncate_chars(content, 120))
        } else {
            content.clone()
        };

        println!(
            "  {}. {} [{}] (score: {:.4})",
            i + 1,
            hit.record.id,
            hit.record.user_id,
            hit.score,
        );
        println!("     {}", preview);
        println!();
    }

    Ok(())
}
