//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, vLLM, llama.cpp server, Ollama's `/v1`
//! shim, and anything else that serves `/chat/completions` with SSE
//! streaming.

use async_trait::async_trait;
use dataclaw_core::error::ProviderError;
use dataclaw_core::provider::*;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::http::{self, Fetched, LineBuffer, StreamTimeouts};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    timeouts: StreamTimeouts,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeouts: StreamTimeouts,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeouts,
            client: http::build_client(timeouts)?,
        })
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, timeouts: StreamTimeouts) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, timeouts)
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": request.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }
}

/// Outcome of decoding one SSE line.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Chunk(StreamChunk),
    Done,
    Skip,
}

fn decode_sse_line(provider: &str, line: &str) -> SseEvent {
    // Empty lines separate events, ':' lines are comments.
    if line.is_empty() || line.starts_with(':') {
        return SseEvent::Skip;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseEvent::Done;
    }

    let parsed: StreamResponse = match serde_json::from_str(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            trace!(provider, data, error = %e, "Ignoring unparseable SSE chunk");
            return SseEvent::Skip;
        }
    };

    if let Some(usage) = parsed.usage {
        return SseEvent::Chunk(StreamChunk::finished(Some(Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })));
    }

    match parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|c| !c.is_empty())
    {
        Some(text) => SseEvent::Chunk(StreamChunk::text(text)),
        None => SseEvent::Skip,
    }
}

#[async_trait]
impl dataclaw_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let builder = self
            .authorized(self.client.post(&url))
            .header("Accept", "text/event-stream")
            .json(&body);
        let response = http::send(builder, self.timeouts.idle).await?;
        let response = http::check_status(&self.name, &request.model, response).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();
        let idle = self.timeouts.idle;

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            loop {
                let bytes = match http::next_fragment(&provider_name, &mut byte_stream, &tx, idle).await {
                    Fetched::Bytes(bytes) => bytes,
                    Fetched::End => break,
                    Fetched::Stop => return,
                };

                lines.push(&bytes);
                while let Some(line) = lines.next_line() {
                    match decode_sse_line(&provider_name, &line) {
                        SseEvent::Skip => {}
                        SseEvent::Done => {
                            let _ = tx.send(Ok(StreamChunk::finished(None))).await;
                            return;
                        }
                        SseEvent::Chunk(chunk) => {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                            if done {
                                return;
                            }
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(StreamChunk::finished(None))).await;
        });

        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = http::send(self.authorized(self.client.get(&url)), self.timeouts.idle).await?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let models = body["data"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response =
            http::send(self.authorized(self.client.get(&url)), self.timeouts.connect).await?;
        Ok(response.status().is_success())
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataclaw_core::Provider;

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test", StreamTimeouts::default()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn body_carries_both_prompts() {
        let request = ProviderRequest::new(
            "gpt-4o-mini",
            PromptPair {
                system: "You are a SQL Debugging Expert.".into(),
                user: "Broken Query:\nSELEC 1".into(),
            },
        );
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["messages"][0]["content"], "You are a SQL Debugging Expert.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn parse_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(
            decode_sse_line("openai", line),
            SseEvent::Chunk(StreamChunk::text("Hello"))
        );
    }

    #[test]
    fn parse_finish_chunk_is_skipped() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(decode_sse_line("openai", line), SseEvent::Skip);
    }

    #[test]
    fn parse_usage_ends_stream() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        match decode_sse_line("openai", line) {
            SseEvent::Chunk(chunk) => {
                assert!(chunk.done);
                assert_eq!(chunk.usage.unwrap().total_tokens, 15);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_done_and_comments() {
        assert_eq!(decode_sse_line("openai", "data: [DONE]"), SseEvent::Done);
        assert_eq!(decode_sse_line("openai", ": keep-alive"), SseEvent::Skip);
        assert_eq!(decode_sse_line("openai", "event: ping"), SseEvent::Skip);
        assert_eq!(decode_sse_line("openai", "data: {oops"), SseEvent::Skip);
    }
}
