//! Schema adapter: live schema summary and guarded read-only queries.

use std::sync::Arc;

use dataclaw_core::warehouse::{QueryOutcome, QueryResult, SqlBackend};
use tracing::{debug, warn};

pub const NO_TABLES: &str = "(No tables found in database)";
pub const SCHEMA_UNAVAILABLE: &str = "(Schema unavailable)";

pub const SAFETY_BLOCK: &str = "Safety Block: Only SELECT queries are allowed.";
pub const NO_RESULTS: &str = "Query executed successfully (no results).";

/// Human-readable name for a backend dialect tag.
pub fn dialect_label(dialect: &str) -> String {
    match dialect {
        "sqlite" => "SQLite".to_string(),
        "postgres" => "PostgreSQL".to_string(),
        other => other.to_uppercase(),
    }
}

/// Statements containing any of these (case-insensitive, anywhere in the
/// text) are refused without reaching the backend.
pub const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "CREATE", "GRANT", "EXEC",
];

/// Lexical read-only check. Matches substrings, so identifiers such as
/// `created_at` are refused too.
pub fn is_read_only(query: &str) -> bool {
    let upper = query.to_uppercase();
    !FORBIDDEN_KEYWORDS.iter().any(|kw| upper.contains(kw))
}

#[derive(Clone)]
pub struct SchemaAdapter {
    backend: Arc<dyn SqlBackend>,
}

impl SchemaAdapter {
    pub fn new(backend: Arc<dyn SqlBackend>) -> Self {
        Self { backend }
    }

    pub fn dialect(&self) -> &str {
        self.backend.dialect()
    }

    pub fn dialect_label(&self) -> String {
        dialect_label(self.dialect())
    }

    /// One line per table with its columns comma-joined. Never fails: an
    /// empty catalog or a backend error yields a placeholder.
    pub async fn schema_summary(&self) -> String {
        let tables = match self.backend.list_columns().await {
            Ok(tables) => tables,
            Err(e) => {
                warn!(error = %e, "Schema introspection failed");
                return SCHEMA_UNAVAILABLE.to_string();
            }
        };

        if tables.is_empty() {
            return NO_TABLES.to_string();
        }

        let mut summary = format!("CURRENT {} SCHEMA:\n", self.dialect_label().to_uppercase());
        for t in &tables {
            summary.push_str(&format!(
                "- Table '{}' columns: {}\n",
                t.table,
                t.columns.join(", ")
            ));
        }
        summary
    }

    /// Run a caller-supplied query if it passes the read-only filter.
    /// Failures come back as data, never as errors.
    pub async fn run_read_only_query(&self, query: &str) -> QueryOutcome {
        if !is_read_only(query) {
            debug!("Refused non read-only query");
            return QueryOutcome::Error {
                error: SAFETY_BLOCK.to_string(),
            };
        }

        match self.backend.execute(query).await {
            Ok(QueryResult::Rows { columns, rows }) => QueryOutcome::Rows { columns, rows },
            Ok(QueryResult::NoResultSet { .. }) => QueryOutcome::Message {
                message: NO_RESULTS.to_string(),
            },
            Err(e) => {
                warn!(error = %e, "Read-only query failed");
                QueryOutcome::Error {
                    error: backend_message(e),
                }
            }
        }
    }
}

/// Strip our own error prefix so the caller sees the backend's text.
fn backend_message(err: dataclaw_core::error::WarehouseError) -> String {
    use dataclaw_core::error::WarehouseError;
    match err {
        WarehouseError::Query(msg) | WarehouseError::Connection(msg) => msg,
        other => other.to_string(),
    }
}
