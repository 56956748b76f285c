//! In-memory backends: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use dataclaw_core::error::{RetrievalError, StoreError};
use dataclaw_core::message::{ConversationId, Message};
use dataclaw_core::retrieval::{RetrievedDocument, Retriever};
use dataclaw_core::store::ConversationStore;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Conversation log kept in a Vec of (id, message) in append order.
#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    entries: Arc<RwLock<Vec<(ConversationId, Message)>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, id: &ConversationId, message: &Message) -> Result<(), StoreError> {
        self.entries.write().await.push((id.clone(), message.clone()));
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationId>, StoreError> {
        let entries = self.entries.read().await;
        let mut ids: Vec<ConversationId> = Vec::new();
        // Walk newest first; first sighting is the latest activity.
        for (id, _) in entries.iter().rev() {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        Ok(ids)
    }

    async fn get_messages(&self, id: &ConversationId) -> Result<Vec<Message>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(cid, _)| cid == id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(cid, _)| cid != id);
        Ok(entries.len() < before)
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Documents held in memory, ranked by how many query words they contain.
#[derive(Clone, Default)]
pub struct InMemoryKnowledgeBase {
    documents: Arc<RwLock<Vec<RetrievedDocument>>>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(source, text)` pairs.
    pub fn with_documents<'a>(docs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let documents = docs
            .into_iter()
            .map(|(source, text)| RetrievedDocument::new(text, source))
            .collect();
        Self {
            documents: Arc::new(RwLock::new(documents)),
        }
    }

    pub async fn add_document(&self, source: &str, text: &str) {
        let mut docs = self.documents.write().await;
        docs.retain(|d| d.source() != Some(source));
        docs.push(RetrievedDocument::new(text, source));
    }
}

#[async_trait]
impl Retriever for InMemoryKnowledgeBase {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        let docs = self.documents.read().await;

        let mut scored: Vec<(usize, &RetrievedDocument)> = docs
            .iter()
            .map(|d| {
                let text = d.text.to_lowercase();
                (words.iter().filter(|w| text.contains(w.as_str())).count(), d)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps insertion order among ties.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, d)| d.clone())
            .collect())
    }
}
