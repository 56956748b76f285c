//! Live warehouse and dbt project adapters for DataClaw.
//!
//! - [`SchemaAdapter`]: schema summary text and guarded read-only queries
//!   over any [`SqlBackend`](dataclaw_core::SqlBackend)
//! - [`AnySqlBackend`]: the sqlx-backed `SqlBackend` (SQLite or Postgres)
//! - [`LineageAdapter`]: model lineage from a dbt `manifest.json`

pub mod lineage;
pub mod schema;
pub mod sql;

pub use lineage::{LineageAdapter, ModelLineage};
pub use schema::{SchemaAdapter, dialect_label, is_read_only};
pub use sql::{AnySqlBackend, Dialect};
