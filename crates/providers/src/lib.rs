//! Generation provider implementations for DataClaw.
//!
//! All providers implement the `dataclaw_core::Provider` trait.
//! The router selects the correct provider based on configuration.

mod http;
pub mod ollama;
pub mod openai_compat;
pub mod router;

pub use http::StreamTimeouts;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
