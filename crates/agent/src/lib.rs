//! The chat pipeline of DataClaw.
//!
//! Every user message goes through the same ordered steps:
//!
//! 1. **Route** the message to a scope ([`IntentRouter`]), retrieving
//!    runbook context unless it is plain small talk
//! 2. **Short-circuit** `welcome`, `meta`, and `out_of_scope` with their
//!    canned (possibly empty) answer
//! 3. **Assemble** a system/user prompt pair from live schema and dbt
//!    lineage ([`PromptAssembler`])
//! 4. **Stream** the generated answer to the caller while accumulating it
//!    ([`ChatOrchestrator`])
//! 5. **Persist** both sides of the turn

pub mod orchestrator;
pub mod prompt;
pub mod repair;
pub mod router;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use orchestrator::{ChatOrchestrator, ChatTurn, GenerationSettings};
pub use prompt::PromptAssembler;
pub use repair::SqlRepair;
pub use router::{IntentRouter, WELCOME_ANSWER};
pub use stream_event::ChatStreamEvent;
