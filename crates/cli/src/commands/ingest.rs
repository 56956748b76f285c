//! `dataclaw ingest`: Index markdown runbooks into the knowledge base.

use std::path::PathBuf;

use dataclaw_config::AppConfig;
use dataclaw_memory::SqliteKnowledgeBase;

pub async fn run(config: AppConfig, dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let dir = dir.unwrap_or_else(|| config.knowledge.docs_dir.clone());
    if !dir.is_dir() {
        return Err(format!("Runbook directory not found: {}", dir.display()).into());
    }

    let kb = SqliteKnowledgeBase::new(&config.knowledge.path.to_string_lossy()).await?;
    let report = kb.ingest_dir(&dir).await?;

    println!("📚 Ingested {} document(s) from {}", report.sources.len(), dir.display());
    for source in &report.sources {
        println!("   + {source}");
    }
    println!("   Knowledge base now holds {} document(s)", kb.count().await?);

    Ok(())
}
