//! Prompt assembler: turns a routed message into the system/user pair sent
//! to generation.
//!
//! Schema and lineage text are fetched fresh on every call.

use dataclaw_core::provider::PromptPair;
use dataclaw_core::routing::RoutingDecision;
use dataclaw_warehouse::{LineageAdapter, SchemaAdapter};
use tracing::debug;

/// Builds generation prompts from live schema and lineage snapshots.
#[derive(Clone)]
pub struct PromptAssembler {
    schema: SchemaAdapter,
    lineage: LineageAdapter,
}

impl PromptAssembler {
    pub fn new(schema: SchemaAdapter, lineage: LineageAdapter) -> Self {
        Self { schema, lineage }
    }

    pub fn schema(&self) -> &SchemaAdapter {
        &self.schema
    }

    /// `None` for scopes answered without generation; the adapters are not
    /// consulted in that case.
    pub async fn assemble(&self, message: &str, decision: &RoutingDecision) -> Option<PromptPair> {
        if !decision.scope.requires_generation() {
            return None;
        }

        let dialect = self.schema.dialect_label();
        let schema = self.schema.schema_summary().await;
        let lineage = self.lineage.lineage_summary().await;
        debug!(
            scope = %decision.scope,
            dialect = %dialect,
            schema_len = schema.len(),
            lineage_len = lineage.len(),
            "Prompt context fetched"
        );

        build(message, decision, &dialect, &schema, &lineage)
    }
}

/// Pure prompt construction from already-fetched summaries. `dialect` is the
/// warehouse's display name and labels both the SQL rule and the schema block.
pub fn build(
    message: &str,
    decision: &RoutingDecision,
    dialect: &str,
    schema: &str,
    lineage: &str,
) -> Option<PromptPair> {
    if !decision.scope.requires_generation() {
        return None;
    }

    let schema_title = dialect.to_uppercase();
    let system = format!(
        "You are a senior Data Engineering assistant.\n\
         Hard rules:\n\
         - Stay strictly in Data Engineering scope\n\
         - Use ONLY the provided context if present\n\
         - If writing SQL, use {dialect} syntax and the SCHEMA below.\n\
         - If asked about lineage or transformations, use the DBT CONTEXT below.\n\
         \n\
         === {schema_title} SCHEMA ===\n\
         {schema}\n\
         \n\
         === DBT PROJECT STRUCTURE ===\n\
         {lineage}\n\
         \n\
         - Format: 1) Short answer 2) Steps 3) Code 4) Check command"
    );

    let user = format!(
        "User question:\n{message}\n\nContext (RAG):\n{}\n",
        decision.context
    );

    Some(PromptPair { system, user })
}
