//! Lineage adapter: dbt `manifest.json` model graph as prompt text.

use std::path::{Path, PathBuf};

use dataclaw_core::error::WarehouseError;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::warn;

pub const LINEAGE_HEADER: &str = "CURRENT DBT PROJECT MODELS:\n";
pub const MANIFEST_MISSING: &str = "(dbt manifest not found. Using SQL context only.)";
pub const NO_DESCRIPTION: &str = "No description.";

/// Upper bound on models rendered into one summary.
pub const MAX_MODELS: usize = 50;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    nodes: IndexMap<String, ManifestNode>,
}

#[derive(Debug, Deserialize)]
struct ManifestNode {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    resource_type: String,
    #[serde(default)]
    depends_on: DependsOn,
}

#[derive(Debug, Default, Deserialize)]
struct DependsOn {
    #[serde(default)]
    nodes: Vec<String>,
}

/// One dbt model and the short names of its upstream nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLineage {
    pub name: String,
    pub description: Option<String>,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LineageAdapter {
    manifest_path: PathBuf,
}

impl LineageAdapter {
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Models in manifest order, at most [`MAX_MODELS`].
    pub async fn models(&self) -> Result<Vec<ModelLineage>, WarehouseError> {
        let raw = match tokio::fs::read_to_string(&self.manifest_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WarehouseError::ManifestMissing(
                    self.manifest_path.display().to_string(),
                ));
            }
            Err(e) => return Err(WarehouseError::ManifestInvalid(e.to_string())),
        };
        parse_models(&raw)
    }

    /// Text block per model. Never fails: a missing or unreadable manifest
    /// yields a placeholder.
    pub async fn lineage_summary(&self) -> String {
        match self.models().await {
            Ok(models) => render(&models),
            Err(WarehouseError::ManifestMissing(path)) => {
                warn!(path = %path, "dbt manifest not found");
                MANIFEST_MISSING.to_string()
            }
            Err(WarehouseError::ManifestInvalid(reason)) => {
                warn!(error = %reason, "dbt manifest unreadable");
                format!("(Error reading dbt manifest: {reason})")
            }
            Err(e) => {
                warn!(error = %e, "dbt manifest unreadable");
                format!("(Error reading dbt manifest: {e})")
            }
        }
    }
}

fn parse_models(raw: &str) -> Result<Vec<ModelLineage>, WarehouseError> {
    let manifest: Manifest =
        serde_json::from_str(raw).map_err(|e| WarehouseError::ManifestInvalid(e.to_string()))?;

    Ok(manifest
        .nodes
        .into_values()
        .filter(|node| node.resource_type == "model")
        .take(MAX_MODELS)
        .map(|node| ModelLineage {
            name: node.name,
            description: node.description.filter(|d| !d.is_empty()),
            parents: node
                .depends_on
                .nodes
                .iter()
                .map(|id| id.rsplit('.').next().unwrap_or(id).to_string())
                .collect(),
        })
        .collect())
}

fn render(models: &[ModelLineage]) -> String {
    let mut out = String::from(LINEAGE_HEADER);
    for model in models {
        let parents = if model.parents.is_empty() {
            "None".to_string()
        } else {
            model.parents.join(", ")
        };
        out.push_str(&format!(
            "- Model: {}\n  Desc: {}\n  Parents: {}\n",
            model.name,
            model.description.as_deref().unwrap_or(NO_DESCRIPTION),
            parents
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &tempfile::TempDir, body: &serde_json::Value) -> PathBuf {
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, serde_json::to_string(body).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn renders_models_in_manifest_order() {
        let dir = tempfile::tempdir().unwrap();
        // Raw text: manifest order must survive parsing.
        let path = dir.path().join("manifest.json");
        std::fs::write(
            &path,
            r#"{
                "nodes": {
                    "model.shop.stg_orders": {
                        "name": "stg_orders",
                        "description": "Cleaned orders",
                        "resource_type": "model",
                        "depends_on": {"nodes": ["source.shop.raw.orders"]}
                    },
                    "test.shop.not_null_orders_id": {
                        "name": "not_null_orders_id",
                        "resource_type": "test",
                        "depends_on": {"nodes": ["model.shop.stg_orders"]}
                    },
                    "model.shop.fct_revenue": {
                        "name": "fct_revenue",
                        "description": "",
                        "resource_type": "model",
                        "depends_on": {"nodes": ["model.shop.stg_orders", "model.shop.stg_payments"]}
                    },
                    "model.shop.dim_dates": {
                        "name": "dim_dates",
                        "resource_type": "model"
                    }
                }
            }"#,
        )
        .unwrap();

        let summary = LineageAdapter::new(path).lineage_summary().await;
        assert_eq!(
            summary,
            "CURRENT DBT PROJECT MODELS:\n\
             - Model: stg_orders\n  Desc: Cleaned orders\n  Parents: orders\n\
             - Model: fct_revenue\n  Desc: No description.\n  Parents: stg_orders, stg_payments\n\
             - Model: dim_dates\n  Desc: No description.\n  Parents: None\n"
        );
    }

    #[tokio::test]
    async fn caps_at_fifty_models() {
        let dir = tempfile::tempdir().unwrap();
        let nodes: serde_json::Map<String, serde_json::Value> = (0..75)
            .map(|i| {
                (
                    format!("model.p.m{i:03}"),
                    serde_json::json!({"name": format!("m{i:03}"), "resource_type": "model"}),
                )
            })
            .collect();
        let path = write_manifest(&dir, &serde_json::json!({ "nodes": nodes }));

        let adapter = LineageAdapter::new(path);
        let models = adapter.models().await.unwrap();
        assert_eq!(models.len(), MAX_MODELS);
        assert_eq!(models[0].name, "m000");
        assert_eq!(adapter.lineage_summary().await.matches("- Model:").count(), 50);
    }

    #[tokio::test]
    async fn missing_manifest_placeholder() {
        let adapter = LineageAdapter::new("/nonexistent/target/manifest.json");
        assert_eq!(adapter.lineage_summary().await, MANIFEST_MISSING);
    }

    #[tokio::test]
    async fn malformed_manifest_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "{ not json").unwrap();

        let summary = LineageAdapter::new(path).lineage_summary().await;
        assert!(summary.starts_with("(Error reading dbt manifest:"));
    }
}
