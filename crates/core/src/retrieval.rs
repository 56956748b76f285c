//! Retriever trait: the black-box document similarity search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A ranked search hit: document text plus free-form metadata
/// (conventionally carrying a `source` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub text: String,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl RetrievedDocument {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), serde_json::Value::String(source.into()));
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// The `source` metadata entry, if present and a string.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }
}

/// Similarity search over the knowledge corpus.
///
/// Implementations must return an empty sequence (not an error) for an
/// empty corpus.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The backend name (e.g., "sqlite_fts", "in_memory").
    fn name(&self) -> &str;

    /// Return at most `top_k` documents, best match first.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<RetrievedDocument>, RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_reads_metadata() {
        let doc = RetrievedDocument::new("Partition by date", "runbooks/bq.md");
        assert_eq!(doc.source(), Some("runbooks/bq.md"));
    }

    #[test]
    fn missing_source_is_none() {
        let doc = RetrievedDocument {
            text: "x".into(),
            metadata: serde_json::Map::new(),
        };
        assert!(doc.source().is_none());
    }
}
