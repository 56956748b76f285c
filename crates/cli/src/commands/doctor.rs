//! `dataclaw doctor`: Diagnose configuration and collaborators.

use std::path::Path;

use dataclaw_config::AppConfig;
use dataclaw_core::warehouse::SqlBackend;
use dataclaw_memory::{SqliteConversationStore, SqliteKnowledgeBase};
use dataclaw_warehouse::{AnySqlBackend, LineageAdapter};
use tracing::warn;

pub async fn run(config: AppConfig, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 DataClaw Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    if config_path.exists() {
        println!("  ✅ Config file: {}", config_path.display());
    } else {
        println!("  ℹ️  No config file at {}, using defaults", config_path.display());
    }

    // Generation backends
    match dataclaw_providers::build_from_config(&config) {
        Ok(router) => {
            for name in router.list() {
                let Some(provider) = router.get(name) else {
                    continue;
                };
                match provider.health_check().await {
                    Ok(true) => println!("  ✅ Provider '{name}' reachable"),
                    Ok(false) => {
                        println!("  ❌ Provider '{name}' not reachable");
                        issues += 1;
                    }
                    Err(e) => {
                        println!("  ❌ Provider '{name}' check failed: {e}");
                        issues += 1;
                    }
                }
            }

            match router.default() {
                Some(provider) => match provider.list_models().await {
                    Ok(models) if model_available(&models, &config.default_model) => {
                        println!("  ✅ Model '{}' available", config.default_model)
                    }
                    Ok(models) if models.is_empty() => println!(
                        "  ℹ️  Provider '{}' did not list models, cannot confirm '{}'",
                        provider.name(),
                        config.default_model
                    ),
                    Ok(_) => {
                        println!(
                            "  ❌ Model '{}' not found on '{}'",
                            config.default_model,
                            provider.name()
                        );
                        issues += 1;
                    }
                    Err(e) => {
                        println!("  ❌ Listing models failed: {e}");
                        issues += 1;
                    }
                },
                None => {
                    println!("  ❌ Provider '{}' is not configured", config.default_provider);
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ Provider setup failed: {e}");
            issues += 1;
        }
    }

    // Conversation store
    match SqliteConversationStore::new(&config.store.path.to_string_lossy()).await {
        Ok(_) => println!("  ✅ Chat store: {}", config.store.path.display()),
        Err(e) => {
            println!("  ❌ Chat store unavailable: {e}");
            issues += 1;
        }
    }

    // Knowledge base
    match SqliteKnowledgeBase::new(&config.knowledge.path.to_string_lossy()).await {
        Ok(kb) => match kb.count().await {
            Ok(0) => {
                println!("  ⚠️  Knowledge base is empty — run `dataclaw ingest`");
                issues += 1;
            }
            Ok(n) => println!("  ✅ Knowledge base: {n} document(s)"),
            Err(e) => {
                println!("  ❌ Knowledge base unreadable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Knowledge base unavailable: {e}");
            issues += 1;
        }
    }

    // Warehouse
    match AnySqlBackend::connect_lazy(&config.warehouse.url, config.warehouse.max_connections) {
        Ok(backend) => match backend.list_columns().await {
            Ok(tables) => println!(
                "  ✅ Warehouse ({}): {} table(s)",
                backend.dialect(),
                tables.len()
            ),
            Err(e) => {
                println!("  ❌ Warehouse unreachable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Warehouse URL invalid: {e}");
            issues += 1;
        }
    }

    // dbt manifest
    let lineage = LineageAdapter::new(&config.lineage.manifest_path);
    match lineage.models().await {
        Ok(models) => println!(
            "  ✅ dbt manifest {}: {} model(s)",
            lineage.manifest_path().display(),
            models.len()
        ),
        Err(e) => {
            println!("  ⚠️  dbt manifest {}: {e}", lineage.manifest_path().display());
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        warn!(issues, "Doctor found problems");
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Ollama lists tags as `name:tag`; a bare name means `:latest`.
fn model_available(models: &[String], wanted: &str) -> bool {
    models.iter().any(|m| {
        m == wanted || (!wanted.contains(':') && m.strip_suffix(":latest") == Some(wanted))
    })
}
