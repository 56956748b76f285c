//! # DataClaw Core
//!
//! Domain types, traits, and error definitions for the DataClaw
//! data-engineering assistant. This crate has **zero framework dependencies**;
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations live
//! in their respective crates:
//!
//! - [`Provider`]: streaming text generation (`dataclaw-providers`)
//! - [`Retriever`]: document similarity search (`dataclaw-memory`)
//! - [`ConversationStore`]: append-only chat transcripts (`dataclaw-memory`)
//! - [`SqlBackend`]: live schema introspection and query execution (`dataclaw-warehouse`)
//!
//! Handles are injected into the router, assembler, and orchestrator at
//! construction time; there is no ambient global state.

pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod routing;
pub mod store;
pub mod warehouse;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{ConversationId, Message, Role};
pub use provider::{PromptPair, Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use retrieval::{RetrievedDocument, Retriever};
pub use routing::{RoutingDecision, Scope};
pub use store::ConversationStore;
pub use warehouse::{QueryOutcome, QueryResult, SqlBackend, TableColumns};
