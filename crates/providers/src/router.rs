//! Provider router: selects the generation backend based on config.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dataclaw_core::error::ProviderError;
use dataclaw_core::provider::Provider;

use crate::http::StreamTimeouts;
use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Holds every configured provider, keyed by name.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// `ollama` gets the native NDJSON client; every other name is treated as
/// an OpenAI-compatible endpoint.
pub fn build_from_config(
    config: &dataclaw_config::AppConfig,
) -> Result<ProviderRouter, ProviderError> {
    let timeouts = StreamTimeouts {
        idle: Duration::from_secs(config.generation.timeout_secs),
        connect: Duration::from_secs(config.generation.connect_timeout_secs),
    };
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let provider = build_one(name, provider_config.api_url.as_deref(), &api_key, timeouts)?;
        router.register(name.clone(), provider);
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let provider = build_one(&config.default_provider, None, &api_key, timeouts)?;
        router.register(config.default_provider.clone(), provider);
    }

    Ok(router)
}

fn build_one(
    name: &str,
    api_url: Option<&str>,
    api_key: &str,
    timeouts: StreamTimeouts,
) -> Result<Arc<dyn Provider>, ProviderError> {
    if name == "ollama" {
        return Ok(Arc::new(OllamaProvider::new(api_url, timeouts)?));
    }

    let base_url = match api_url {
        Some(url) => url.to_string(),
        None => default_base_url(name).ok_or_else(|| {
            ProviderError::NotConfigured(format!("{name}: no api_url configured"))
        })?,
    };
    Ok(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key, timeouts)?))
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}
