//! Chat-level streaming events.
//!
//! `ChatStreamEvent` wraps provider-level stream chunks into the events the
//! gateway and CLI forward to clients.

use dataclaw_core::provider::Usage;
use dataclaw_core::routing::Scope;
use serde::{Deserialize, Serialize};

/// Events emitted while a generated answer streams.
///
/// - `meta` : always first: which conversation and scope this is
/// - `chunk`: partial text from the generation backend
/// - `done` : the answer is complete and persisted
/// - `error`: generation failed; any partial text was kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    Meta { chat_id: String, scope: Scope },

    Chunk { content: String },

    Done { usage: Option<Usage> },

    Error { message: String },
}
