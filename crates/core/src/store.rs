//! ConversationStore trait: the append-only chat transcript log.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{ConversationId, Message};

/// Persistence for chat transcripts, keyed by conversation id.
///
/// Callers treat durability as best-effort: failures are logged and degraded
/// to empty results rather than aborting a chat turn.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append a message to a conversation.
    async fn append(&self, id: &ConversationId, message: &Message) -> Result<(), StoreError>;

    /// All conversation ids, most recently active first.
    async fn list_conversations(&self) -> Result<Vec<ConversationId>, StoreError>;

    /// Messages of one conversation in creation order.
    async fn get_messages(&self, id: &ConversationId) -> Result<Vec<Message>, StoreError>;

    /// Remove one conversation. Returns whether anything was deleted.
    async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, StoreError>;

    /// Remove every conversation.
    async fn delete_all(&self) -> Result<(), StoreError>;
}
