//! SQL repair: ask the model to fix a failing query against the live schema.

use std::sync::Arc;

use dataclaw_core::error::ProviderError;
use dataclaw_core::provider::{PromptPair, Provider, ProviderRequest};
use dataclaw_warehouse::SchemaAdapter;
use tracing::{debug, warn};

use crate::orchestrator::GenerationSettings;

pub struct SqlRepair {
    schema: SchemaAdapter,
    provider: Arc<dyn Provider>,
    settings: GenerationSettings,
}

impl SqlRepair {
    pub fn new(
        schema: SchemaAdapter,
        provider: Arc<dyn Provider>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            schema,
            provider,
            settings,
        }
    }

    /// The corrected query, stripped of markdown fences.
    pub async fn fix(&self, query: &str, error: &str) -> Result<String, ProviderError> {
        let schema = self.schema.schema_summary().await;
        let request = ProviderRequest::new(&self.settings.model, repair_prompt(query, error, &schema))
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let response = self.provider.complete(request).await.map_err(|e| {
            warn!(error = %e, "SQL repair generation failed");
            e
        })?;

        let fixed = strip_code_fences(&response.content);
        debug!(chars = fixed.len(), "SQL repaired");
        Ok(fixed)
    }
}

pub fn repair_prompt(query: &str, error: &str, schema: &str) -> PromptPair {
    PromptPair {
        system: format!(
            "You are a SQL Debugging Expert.\n\
             Your task: Fix the broken SQL query based on the error message and the schema.\n\
             Rules:\n\
             - Output ONLY the corrected SQL query.\n\
             - Do NOT output markdown, explanations, or backticks.\n\
             Database Schema:\n\
             {schema}"
        ),
        user: format!("Broken Query:\n{query}\n\nError Message:\n{error}\n\nCorrected SQL:"),
    }
}

fn strip_code_fences(text: &str) -> String {
    text.replace("```sql", "").replace("```", "").trim().to_string()
}
