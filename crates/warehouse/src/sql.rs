//! `SqlBackend` over an sqlx `Any` pool (SQLite or Postgres).

use async_trait::async_trait;
use dataclaw_core::error::WarehouseError;
use dataclaw_core::warehouse::{QueryResult, Row as OutRow, SqlBackend, TableColumns};
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Executor, Row, TypeInfo, ValueRef};
use tracing::{debug, info};

/// Which catalog queries to use for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self, WarehouseError> {
        if url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else if url.starts_with("postgres:") || url.starts_with("postgresql:") {
            Ok(Dialect::Postgres)
        } else {
            Err(WarehouseError::Connection(format!(
                "unsupported warehouse URL scheme: {}",
                url.split(':').next().unwrap_or_default()
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    fn columns_query(&self) -> &'static str {
        match self {
            Dialect::Sqlite => {
                r#"
                SELECT m.name AS table_name, p.name AS column_name
                FROM sqlite_master m
                JOIN pragma_table_info(m.name) p
                WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'
                ORDER BY m.name, p.cid
                "#
            }
            Dialect::Postgres => {
                r#"
                SELECT table_name::text AS table_name, column_name::text AS column_name
                FROM information_schema.columns
                WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
                ORDER BY table_schema, table_name, ordinal_position
                "#
            }
        }
    }
}

/// Live SQL connection pool.
pub struct AnySqlBackend {
    pool: AnyPool,
    dialect: Dialect,
}

impl AnySqlBackend {
    /// Connect lazily to `url`; the first query opens the first connection.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self, WarehouseError> {
        let dialect = Dialect::from_url(url)?;
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(|e| WarehouseError::Connection(e.to_string()))?;

        info!(dialect = dialect.as_str(), "Warehouse pool configured");
        Ok(Self { pool, dialect })
    }

    /// Connect eagerly, failing fast if the warehouse is unreachable.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, WarehouseError> {
        let dialect = Dialect::from_url(url)?;
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| WarehouseError::Connection(e.to_string()))?;

        Ok(Self { pool, dialect })
    }
}

/// Convert one column of an `AnyRow` into JSON.
fn cell_to_json(row: &AnyRow, index: usize) -> serde_json::Value {
    use serde_json::Value;

    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(e) => return Value::String(format!("<{e}>")),
    }

    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Value::Bool(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Value::String(String::from_utf8_lossy(&v).into_owned());
    }

    let type_name = row.column(index).type_info().name().to_string();
    Value::String(format!("<{type_name}>"))
}

#[async_trait]
impl SqlBackend for AnySqlBackend {
    fn dialect(&self) -> &str {
        self.dialect.as_str()
    }

    async fn list_columns(&self) -> Result<Vec<TableColumns>, WarehouseError> {
        let rows = sqlx::query(self.dialect.columns_query())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WarehouseError::Query(e.to_string()))?;

        let mut tables: Vec<TableColumns> = Vec::new();
        for row in &rows {
            let table: String = row
                .try_get("table_name")
                .map_err(|e| WarehouseError::Query(e.to_string()))?;
            let column: String = row
                .try_get("column_name")
                .map_err(|e| WarehouseError::Query(e.to_string()))?;

            // Rows arrive grouped by table.
            match tables.last_mut() {
                Some(last) if last.table == table => last.columns.push(column),
                _ => tables.push(TableColumns {
                    table,
                    columns: vec![column],
                }),
            }
        }
        Ok(tables)
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, WarehouseError> {
        let described = (&self.pool)
            .describe(sql)
            .await
            .map_err(|e| WarehouseError::Query(e.to_string()))?;

        let columns: Vec<String> = described
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        if columns.is_empty() {
            let done = sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| WarehouseError::Query(e.to_string()))?;
            debug!(rows_affected = done.rows_affected(), "Statement executed");
            return Ok(QueryResult::NoResultSet {
                rows_affected: done.rows_affected(),
            });
        }

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WarehouseError::Query(e.to_string()))?;

        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.clone(), cell_to_json(row, i)))
                    .collect::<OutRow>()
            })
            .collect();

        Ok(QueryResult::Rows { columns, rows })
    }
}
