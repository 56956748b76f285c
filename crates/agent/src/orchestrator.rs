//! Conversation orchestrator: one chat turn, end to end.
//!
//! resolve id → persist user message → route → (canned answer | assemble
//! prompt → stream generation) → persist assistant message.
//!
//! Streamed answers are teed: every fragment is forwarded to the caller and
//! appended to an accumulator at the same time. If the caller goes away the
//! upstream is dropped and whatever was accumulated is persisted; the same
//! holds when generation fails mid-stream.

use std::sync::Arc;

use dataclaw_core::message::{ConversationId, Message};
use dataclaw_core::provider::{Provider, ProviderRequest};
use dataclaw_core::routing::Scope;
use dataclaw_core::store::ConversationStore;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::prompt::PromptAssembler;
use crate::router::IntentRouter;
use crate::stream_event::ChatStreamEvent;

/// Generation parameters applied to every turn.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "qwen2.5:7b".into(),
            temperature: 0.2,
            max_tokens: None,
        }
    }
}

/// The result of one chat turn.
#[derive(Debug)]
pub enum ChatTurn {
    /// Answered without generation (`welcome`, `meta`, `out_of_scope`).
    Answered {
        chat_id: ConversationId,
        scope: Scope,
        answer: String,
    },
    /// A generated answer; `events` starts with [`ChatStreamEvent::Meta`].
    Streaming {
        chat_id: ConversationId,
        scope: Scope,
        events: mpsc::Receiver<ChatStreamEvent>,
    },
}

impl ChatTurn {
    pub fn chat_id(&self) -> &ConversationId {
        match self {
            ChatTurn::Answered { chat_id, .. } | ChatTurn::Streaming { chat_id, .. } => chat_id,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            ChatTurn::Answered { scope, .. } | ChatTurn::Streaming { scope, .. } => *scope,
        }
    }
}

/// How a tee run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TeeEnd {
    Completed,
    Disconnected,
    Failed(String),
}

pub struct ChatOrchestrator {
    router: IntentRouter,
    assembler: PromptAssembler,
    provider: Arc<dyn Provider>,
    store: Arc<dyn ConversationStore>,
    settings: GenerationSettings,
}

impl ChatOrchestrator {
    pub fn new(
        router: IntentRouter,
        assembler: PromptAssembler,
        provider: Arc<dyn Provider>,
        store: Arc<dyn ConversationStore>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            router,
            assembler,
            provider,
            store,
            settings,
        }
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    /// Run one chat turn. Never fails: collaborator errors are logged and
    /// degraded, generation errors arrive as a [`ChatStreamEvent::Error`].
    pub async fn handle_turn(&self, chat_id: Option<&str>, message: &str) -> ChatTurn {
        let chat_id = ConversationId::parse_or_new(chat_id);
        persist(self.store.as_ref(), &chat_id, &Message::user(message)).await;

        let decision = self.router.route(message).await;
        info!(chat_id = %chat_id, scope = %decision.scope, "Message routed");

        let Some(prompt) = self.assembler.assemble(message, &decision).await else {
            let answer = decision.direct_answer().to_string();
            persist(
                self.store.as_ref(),
                &chat_id,
                &Message::assistant(decision.scope, answer.as_str()),
            )
            .await;
            return ChatTurn::Answered {
                chat_id,
                scope: decision.scope,
                answer,
            };
        };

        let request = ProviderRequest::new(&self.settings.model, prompt)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(tee(
            self.provider.clone(),
            self.store.clone(),
            request,
            chat_id.clone(),
            decision.scope,
            tx,
        ));

        ChatTurn::Streaming {
            chat_id,
            scope: decision.scope,
            events: rx,
        }
    }

    /// Conversation ids, most recent first. Empty if the store fails.
    pub async fn list_chats(&self) -> Vec<ConversationId> {
        self.store.list_conversations().await.unwrap_or_else(|e| {
            warn!(error = %e, "Listing conversations failed");
            Vec::new()
        })
    }

    /// Messages of one conversation. Empty if unknown or the store fails.
    pub async fn chat_messages(&self, chat_id: &str) -> Vec<Message> {
        let id = ConversationId(chat_id.to_string());
        self.store.get_messages(&id).await.unwrap_or_else(|e| {
            warn!(chat_id, error = %e, "Reading conversation failed");
            Vec::new()
        })
    }

    pub async fn delete_chat(&self, chat_id: &str) -> bool {
        let id = ConversationId(chat_id.to_string());
        self.store.delete_conversation(&id).await.unwrap_or_else(|e| {
            warn!(chat_id, error = %e, "Deleting conversation failed");
            false
        })
    }

    pub async fn delete_all_chats(&self) {
        if let Err(e) = self.store.delete_all().await {
            warn!(error = %e, "Deleting all conversations failed");
        }
    }
}

async fn persist(store: &dyn ConversationStore, chat_id: &ConversationId, message: &Message) {
    if let Err(e) = store.append(chat_id, message).await {
        warn!(chat_id = %chat_id, role = %message.role, error = %e, "Persisting message failed");
    }
}

/// Forward generation fragments to `tx` while accumulating them, then
/// persist the answer.
async fn tee(
    provider: Arc<dyn Provider>,
    store: Arc<dyn ConversationStore>,
    request: ProviderRequest,
    chat_id: ConversationId,
    scope: Scope,
    tx: mpsc::Sender<ChatStreamEvent>,
) {
    let meta = ChatStreamEvent::Meta {
        chat_id: chat_id.to_string(),
        scope,
    };
    if tx.send(meta).await.is_err() {
        debug!(chat_id = %chat_id, "Caller gone before generation started");
        return;
    }

    let mut upstream = match provider.stream(request).await {
        Ok(rx) => rx,
        Err(e) => {
            warn!(chat_id = %chat_id, provider = provider.name(), error = %e, "Generation failed to start");
            let _ = tx
                .send(ChatStreamEvent::Error {
                    message: e.to_string(),
                })
                .await;
            return;
        }
    };

    let mut answer = String::new();
    let mut usage = None;
    let end = loop {
        tokio::select! {
            _ = tx.closed() => break TeeEnd::Disconnected,
            next = upstream.recv() => match next {
                None => break TeeEnd::Completed,
                Some(Ok(chunk)) => {
                    if chunk.usage.is_some() {
                        usage = chunk.usage;
                    }
                    if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                        answer.push_str(&text);
                        if tx.send(ChatStreamEvent::Chunk { content: text }).await.is_err() {
                            break TeeEnd::Disconnected;
                        }
                    }
                    if chunk.done {
                        break TeeEnd::Completed;
                    }
                }
                Some(Err(e)) => {
                    warn!(chat_id = %chat_id, error = %e, "Generation failed mid-stream");
                    break TeeEnd::Failed(e.to_string());
                }
            }
        }
    };

    // Stops the provider's reader task.
    drop(upstream);

    // Persisted before the terminal event is sent.
    if end == TeeEnd::Completed || !answer.is_empty() {
        persist(store.as_ref(), &chat_id, &Message::assistant(scope, answer.as_str())).await;
    }

    match end {
        TeeEnd::Completed => {
            let _ = tx.send(ChatStreamEvent::Done { usage }).await;
            info!(chat_id = %chat_id, chars = answer.len(), "Answer streamed");
        }
        TeeEnd::Disconnected => {
            info!(chat_id = %chat_id, chars = answer.len(), "Caller disconnected mid-stream");
        }
        TeeEnd::Failed(message) => {
            let _ = tx.send(ChatStreamEvent::Error { message }).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CountingRetriever, Ending, FixedBackend, ScriptedProvider};
    use dataclaw_core::message::Role;
    use dataclaw_memory::InMemoryConversationStore;
    use dataclaw_warehouse::{LineageAdapter, SchemaAdapter};
    use std::time::Duration;

    struct Harness {
        orchestrator: ChatOrchestrator,
        provider: Arc<ScriptedProvider>,
        store: InMemoryConversationStore,
    }

    fn harness(provider: ScriptedProvider, retriever: CountingRetriever) -> Harness {
        let provider = Arc::new(provider);
        let store = InMemoryConversationStore::new();
        let assembler = PromptAssembler::new(
            SchemaAdapter::new(Arc::new(FixedBackend::with_table(
                "customers",
                &["id", "name", "lifetime_value"],
            ))),
            LineageAdapter::new("/nonexistent/manifest.json"),
        );
        let orchestrator = ChatOrchestrator::new(
            IntentRouter::new(Arc::new(retriever)),
            assembler,
            provider.clone(),
            Arc::new(store.clone()),
            GenerationSettings::default(),
        );
        Harness {
            orchestrator,
            provider,
            store,
        }
    }

    async fn drain(mut events: mpsc::Receiver<ChatStreamEvent>) -> Vec<ChatStreamEvent> {
        let mut out = Vec::new();
        while let Some(e) = events.recv().await {
            out.push(e);
        }
        out
    }

    /// Poll until the background tee has persisted `count` messages.
    async fn wait_for_messages(store: &InMemoryConversationStore, id: &ConversationId, count: usize) -> Vec<Message> {
        for _ in 0..100 {
            let messages = store.get_messages(id).await.unwrap();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        store.get_messages(id).await.unwrap()
    }

    #[tokio::test]
    async fn welcome_is_answered_without_generation() {
        let h = harness(ScriptedProvider::answering(&["unused"]), CountingRetriever::empty());
        let turn = h.orchestrator.handle_turn(None, "hello").await;

        match &turn {
            ChatTurn::Answered { scope, answer, .. } => {
                assert_eq!(*scope, Scope::Welcome);
                assert!(answer.contains("Data Engineering Assistant"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(h.provider.requests().is_empty());

        let messages = h.store.get_messages(turn.chat_id()).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].scope, Some(Scope::Welcome));
    }

    #[tokio::test]
    async fn meta_answer_is_empty() {
        let h = harness(
            ScriptedProvider::answering(&["unused"]),
            CountingRetriever::with_docs(&[("conv.md", "snake_case everywhere")]),
        );
        match h.orchestrator.handle_turn(None, "what is your purpose").await {
            ChatTurn::Answered { scope, answer, .. } => {
                assert_eq!(scope, Scope::Meta);
                assert_eq!(answer, "");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(h.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn sql_turn_streams_and_persists_full_answer() {
        let h = harness(
            ScriptedProvider::answering(&["SELECT * ", "FROM customers ", "LIMIT 10"]),
            CountingRetriever::empty(),
        );
        let supplied = "6F9619FF-8B86-4011-B42D-00C04FC964FF";
        let turn = h
            .orchestrator
            .handle_turn(Some(supplied), "show me the top 10 customers")
            .await;

        assert_eq!(turn.chat_id().as_str(), supplied.to_lowercase());
        assert_eq!(turn.scope(), Scope::Sql);
        let chat_id = turn.chat_id().clone();
        let ChatTurn::Streaming { events, .. } = turn else {
            panic!("expected streaming turn");
        };

        let events = drain(events).await;
        assert_eq!(
            events.first(),
            Some(&ChatStreamEvent::Meta {
                chat_id: chat_id.to_string(),
                scope: Scope::Sql
            })
        );
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                ChatStreamEvent::Chunk { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "SELECT * FROM customers LIMIT 10");
        assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));

        let requests = h.provider.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .system
            .contains("- Table 'customers' columns: id, name, lifetime_value"));

        let messages = wait_for_messages(&h.store, &chat_id, 2).await;
        assert_eq!(messages[1].content, "SELECT * FROM customers LIMIT 10");
        assert_eq!(messages[1].scope, Some(Scope::Sql));
    }

    #[tokio::test]
    async fn invalid_chat_id_is_replaced() {
        let h = harness(ScriptedProvider::answering(&[]), CountingRetriever::empty());
        let turn = h.orchestrator.handle_turn(Some("not-a-uuid"), "hey").await;
        assert_ne!(turn.chat_id().as_str(), "not-a-uuid");
        assert!(uuid_like(turn.chat_id().as_str()));
    }

    fn uuid_like(s: &str) -> bool {
        s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_partial_text() {
        let h = harness(
            ScriptedProvider::new(&["SELECT ", "name"], Ending::Fail),
            CountingRetriever::empty(),
        );
        let turn = h.orchestrator.handle_turn(None, "list customers").await;
        let chat_id = turn.chat_id().clone();
        let ChatTurn::Streaming { events, .. } = turn else {
            panic!("expected streaming turn");
        };

        let events = drain(events).await;
        assert!(matches!(events.last(), Some(ChatStreamEvent::Error { .. })));

        let messages = wait_for_messages(&h.store, &chat_id, 2).await;
        assert_eq!(messages[1].content, "SELECT name");
    }

    #[tokio::test]
    async fn partial_text_is_stored_before_error_event() {
        let h = harness(
            ScriptedProvider::new(&["SELECT ", "name"], Ending::Fail),
            CountingRetriever::empty(),
        );
        let turn = h.orchestrator.handle_turn(None, "list customers").await;
        let chat_id = turn.chat_id().clone();
        let ChatTurn::Streaming { mut events, .. } = turn else {
            panic!("expected streaming turn");
        };

        while let Some(event) = events.recv().await {
            if let ChatStreamEvent::Error { .. } = event {
                // No waiting: the write must already be visible.
                let messages = h.store.get_messages(&chat_id).await.unwrap();
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[1].content, "SELECT name");
                return;
            }
        }
        panic!("stream ended without an error event");
    }

    #[tokio::test]
    async fn completed_answer_is_stored_before_done_event() {
        let h = harness(
            ScriptedProvider::answering(&["SELECT ", "1"]),
            CountingRetriever::empty(),
        );
        let turn = h.orchestrator.handle_turn(None, "run a sql check").await;
        let chat_id = turn.chat_id().clone();
        let ChatTurn::Streaming { mut events, .. } = turn else {
            panic!("expected streaming turn");
        };

        while let Some(event) = events.recv().await {
            if let ChatStreamEvent::Done { .. } = event {
                let messages = h.store.get_messages(&chat_id).await.unwrap();
                assert_eq!(messages[1].content, "SELECT 1");
                return;
            }
        }
        panic!("stream ended without a done event");
    }

    #[tokio::test]
    async fn disconnect_persists_partial_text() {
        let h = harness(
            ScriptedProvider::new(&["Partition ", "by day"], Ending::Stall),
            CountingRetriever::empty(),
        );
        let turn = h.orchestrator.handle_turn(None, "bigquery partition advice").await;
        assert_eq!(turn.scope(), Scope::Bigquery);
        let chat_id = turn.chat_id().clone();
        let ChatTurn::Streaming { mut events, .. } = turn else {
            panic!("expected streaming turn");
        };

        // meta + both fragments, then hang up mid-stream.
        for _ in 0..3 {
            events.recv().await.unwrap();
        }
        drop(events);

        let messages = wait_for_messages(&h.store, &chat_id, 2).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Partition by day");
    }

    #[tokio::test]
    async fn history_helpers_round_through_store() {
        let h = harness(ScriptedProvider::answering(&[]), CountingRetriever::empty());
        let turn = h.orchestrator.handle_turn(None, "hi").await;
        let id = turn.chat_id().to_string();

        assert_eq!(h.orchestrator.list_chats().await.len(), 1);
        assert_eq!(h.orchestrator.chat_messages(&id).await.len(), 2);
        assert!(h.orchestrator.delete_chat(&id).await);
        assert!(h.orchestrator.list_chats().await.is_empty());
    }
}
