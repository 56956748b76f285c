//! SQLite-backed chat transcript store.
//!
//! A single `chat_messages` table holds every message of every
//! conversation. The integer primary key doubles as the insertion order,
//! so ordering never depends on clock resolution.

use async_trait::async_trait;
use chrono::Utc;
use dataclaw_core::error::StoreError;
use dataclaw_core::message::{ConversationId, Message, Role};
use dataclaw_core::routing::Scope;
use dataclaw_core::store::ConversationStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Open (creating if missing) a WAL-mode SQLite pool.
///
/// Accepts either a sqlx URL (`sqlite::memory:`, `sqlite://file.db`) or a
/// plain filesystem path.
pub(crate) async fn connect(location: &str) -> Result<SqlitePool, String> {
    let options = if location.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(location)
            .map_err(|e| format!("Invalid SQLite path: {e}"))?
    } else {
        if let Some(parent) = std::path::Path::new(location).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
            }
        }
        SqliteConnectOptions::new().filename(location)
    };

    let options = options
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    // Every in-memory connection is its own database.
    let max_connections = if location.contains(":memory:") { 1 } else { 4 };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| format!("Failed to open SQLite: {e}"))
}

/// Chat transcripts persisted in SQLite.
pub struct SqliteConversationStore {
    pool: SqlitePool,
}

impl SqliteConversationStore {
    /// Open the store at `location`, creating the schema if needed.
    /// Pass `"sqlite::memory:"` for an ephemeral database.
    pub async fn new(location: &str) -> Result<Self, StoreError> {
        let pool = connect(location).await.map_err(StoreError::Storage)?;
        let store = Self::from_pool(pool).await?;
        info!("SQLite conversation store initialized at {location}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id     TEXT NOT NULL,
                role        TEXT NOT NULL,
                scope       TEXT,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_chat ON chat_messages(chat_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chat_id index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
        let role: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let scope: Option<String> = row
            .try_get("scope")
            .map_err(|e| StoreError::QueryFailed(format!("scope column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let role = Role::from_str(&role).map_err(StoreError::QueryFailed)?;

        let scope = scope.and_then(|s| match Scope::from_str(&s) {
            Ok(scope) => Some(scope),
            Err(e) => {
                warn!(error = %e, "Dropping unrecognized stored scope");
                None
            }
        });

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Message {
            role,
            scope,
            content,
            created_at,
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, id: &ConversationId, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chat_messages (chat_id, role, scope, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.as_str())
        .bind(message.role.as_str())
        .bind(message.scope.map(|s| s.as_str()))
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("append: {e}")))?;

        debug!(chat_id = %id, role = %message.role, "Message appended");
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationId>, StoreError> {
        let rows = sqlx::query(
            "SELECT chat_id FROM chat_messages GROUP BY chat_id ORDER BY MAX(iid) DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list conversations: {e}")))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("chat_id")
                    .map(ConversationId)
                    .map_err(|e| StoreError::QueryFailed(format!("chat_id column: {e}")))
            })
            .collect()
    }

    async fn get_messages(&self, id: &ConversationId) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT role, scope, content, created_at FROM chat_messages
             WHERE chat_id = ?1 ORDER BY iid",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("get messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE chat_id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("delete conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM chat_messages")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("delete all: {e}")))?;
        Ok(())
    }
}
