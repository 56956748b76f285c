//! Knowledge base: runbook documents indexed with SQLite FTS5.
//!
//! - `documents`: one row per source path, upserted on re-ingest
//! - `documents_fts`: external-content FTS5 index ranked with BM25
//!
//! Triggers keep the FTS index in sync on insert/delete/update.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use dataclaw_core::error::RetrievalError;
use dataclaw_core::retrieval::{RetrievedDocument, Retriever};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::sqlite::connect;

/// Summary of one `ingest_dir` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Sources written, in ingestion order
    pub sources: Vec<String>,
}

/// Full-text searchable document corpus.
pub struct SqliteKnowledgeBase {
    pool: SqlitePool,
}

impl SqliteKnowledgeBase {
    /// Open the knowledge base at `location`, creating the schema if needed.
    pub async fn new(location: &str) -> Result<Self, RetrievalError> {
        let pool = connect(location).await.map_err(RetrievalError::Unavailable)?;
        let kb = Self { pool };
        kb.run_migrations().await?;
        info!("Knowledge base initialized at {location}");
        Ok(kb)
    }

    async fn run_migrations(&self) -> Result<(), RetrievalError> {
        let statements = [
            (
                "documents table",
                r#"
                CREATE TABLE IF NOT EXISTS documents (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    source      TEXT UNIQUE NOT NULL,
                    content     TEXT NOT NULL,
                    updated_at  TEXT NOT NULL
                )
                "#,
            ),
            (
                "FTS5 table",
                r#"
                CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
                    content,
                    content='documents',
                    content_rowid='iid',
                    tokenize='porter unicode61'
                )
                "#,
            ),
            (
                "insert trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents BEGIN
                    INSERT INTO documents_fts(rowid, content) VALUES (new.iid, new.content);
                END
                "#,
            ),
            (
                "delete trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents BEGIN
                    INSERT INTO documents_fts(documents_fts, rowid, content)
                    VALUES ('delete', old.iid, old.content);
                END
                "#,
            ),
            (
                "update trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE ON documents BEGIN
                    INSERT INTO documents_fts(documents_fts, rowid, content)
                    VALUES ('delete', old.iid, old.content);
                    INSERT INTO documents_fts(rowid, content) VALUES (new.iid, new.content);
                END
                "#,
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| RetrievalError::Unavailable(format!("{what}: {e}")))?;
        }

        debug!("Knowledge base migrations complete");
        Ok(())
    }

    /// Insert or replace the document stored under `source`.
    pub async fn add_document(&self, source: &str, text: &str) -> Result<(), RetrievalError> {
        sqlx::query(
            "INSERT INTO documents (source, content, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(source) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at",
        )
        .bind(source)
        .bind(text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RetrievalError::Unavailable(format!("upsert {source}: {e}")))?;
        Ok(())
    }

    /// Number of indexed documents.
    pub async fn count(&self) -> Result<usize, RetrievalError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("count: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| RetrievalError::Malformed(e.to_string()))?;
        Ok(n as usize)
    }

    /// Index every `*.md` file directly under `dir`, in file-name order.
    ///
    /// The canonical path is the document's source, so re-ingesting the
    /// same directory replaces documents instead of duplicating them.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestReport, RetrievalError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("{}: {e}", dir.display())))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?
        {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut report = IngestReport::default();
        for path in paths {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| RetrievalError::Unavailable(format!("{}: {e}", path.display())))?;
            let source = tokio::fs::canonicalize(&path)
                .await
                .unwrap_or(path)
                .display()
                .to_string();
            self.add_document(&source, &text).await?;
            debug!(source = %source, "Document ingested");
            report.sources.push(source);
        }

        info!(count = report.sources.len(), dir = %dir.display(), "Ingestion complete");
        Ok(report)
    }
}

/// Turn free text into an FTS5 OR-query of quoted prefix terms.
///
/// Any single shared term is enough to match; BM25 ranks documents that
/// share more terms higher.
fn sanitize_fts_query(text: &str) -> String {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{w}\"*"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[async_trait]
impl Retriever for SqliteKnowledgeBase {
    fn name(&self) -> &str {
        "sqlite_fts"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let fts_query = sanitize_fts_query(query);
        if fts_query.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT d.source, d.content
            FROM documents_fts f
            JOIN documents d ON d.iid = f.rowid
            WHERE documents_fts MATCH ?1
            ORDER BY bm25(documents_fts)
            LIMIT ?2
            "#,
        )
        .bind(&fts_query)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RetrievalError::Unavailable(format!("FTS search: {e}")))?;

        rows.iter()
            .map(|row| {
                let source: String = row
                    .try_get("source")
                    .map_err(|e| RetrievalError::Malformed(format!("source column: {e}")))?;
                let content: String = row
                    .try_get("content")
                    .map_err(|e| RetrievalError::Malformed(format!("content column: {e}")))?;
                Ok(RetrievedDocument::new(content, source))
            })
            .collect()
    }
}
