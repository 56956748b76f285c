//! SqlBackend trait: the black-box SQL service behind the schema adapter.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::WarehouseError;

/// One row, keyed by column name in result-set column order.
pub type Row = IndexMap<String, serde_json::Value>;

/// Column names of one live table, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumns {
    pub table: String,
    pub columns: Vec<String>,
}

/// What the backend reports after executing a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// The statement produced a result set (possibly with zero rows).
    Rows { columns: Vec<String>, rows: Vec<Row> },
    /// The statement produced no result set.
    NoResultSet { rows_affected: u64 },
}

/// The structured, user-visible outcome of a read-only query request.
///
/// Serialized untagged so the wire shape is exactly one of
/// `{columns, rows}`, `{message}`, or `{error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Rows { columns: Vec<String>, rows: Vec<Row> },
    Message { message: String },
    Error { error: String },
}

impl QueryOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, QueryOutcome::Error { .. })
    }
}

/// Live SQL connection used for schema introspection and query execution.
#[async_trait]
pub trait SqlBackend: Send + Sync {
    /// The dialect name (e.g., "sqlite", "postgres").
    fn dialect(&self) -> &str;

    /// Table/column metadata of user tables, ordered by table name then
    /// column ordinal.
    async fn list_columns(&self) -> Result<Vec<TableColumns>, WarehouseError>;

    /// Execute a statement as-is. No safety checks happen at this layer.
    async fn execute(&self, sql: &str) -> Result<QueryResult, WarehouseError>;
}
