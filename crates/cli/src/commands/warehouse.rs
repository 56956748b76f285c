//! `dataclaw schema` and `dataclaw lineage`: Print the context blocks the
//! assistant sees.

use std::sync::Arc;

use dataclaw_config::AppConfig;
use dataclaw_warehouse::{AnySqlBackend, LineageAdapter, SchemaAdapter};

pub async fn schema(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let backend = AnySqlBackend::connect_lazy(&config.warehouse.url, config.warehouse.max_connections)?;
    let adapter = SchemaAdapter::new(Arc::new(backend));

    println!("{}", adapter.schema_summary().await);
    Ok(())
}

pub async fn lineage(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let adapter = LineageAdapter::new(&config.lineage.manifest_path);

    println!("{}", adapter.lineage_summary().await);
    Ok(())
}
