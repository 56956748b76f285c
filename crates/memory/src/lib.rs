//! Persistence and retrieval backends for DataClaw.
//!
//! - [`SqliteConversationStore`]: chat transcripts in `chat_messages`
//! - [`SqliteKnowledgeBase`]: FTS5-ranked runbook corpus
//! - in-memory twins of both for tests and ephemeral sessions

pub mod in_memory;
pub mod knowledge;
pub mod sqlite;

pub use in_memory::{InMemoryConversationStore, InMemoryKnowledgeBase};
pub use knowledge::{IngestReport, SqliteKnowledgeBase};
pub use sqlite::SqliteConversationStore;
