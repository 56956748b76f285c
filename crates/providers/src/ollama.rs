//! Native Ollama provider.
//!
//! Talks to `POST {base}/api/chat` with `stream: true`. Ollama answers with
//! newline-delimited JSON objects, each carrying a `message.content` delta;
//! the last one has `done: true` plus token counts.

use async_trait::async_trait;
use dataclaw_core::error::ProviderError;
use dataclaw_core::provider::*;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::http::{self, Fetched, LineBuffer, StreamTimeouts};

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// A provider backed by a local or remote Ollama server.
pub struct OllamaProvider {
    base_url: String,
    timeouts: StreamTimeouts,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: Option<&str>, timeouts: StreamTimeouts) -> Result<Self, ProviderError> {
        let base_url = base_url
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            base_url,
            timeouts,
            client: http::build_client(timeouts)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut options = serde_json::json!({ "temperature": request.temperature });
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = serde_json::json!(max_tokens);
        }

        serde_json::json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "stream": true,
            "options": options,
        })
    }
}

/// Outcome of decoding one NDJSON line.
#[derive(Debug, PartialEq)]
enum LineEvent {
    Chunk(StreamChunk),
    Failed(String),
    Skip,
}

fn decode_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }

    let parsed: ChatLine = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            trace!(line, error = %e, "Ignoring unparseable Ollama line");
            return LineEvent::Skip;
        }
    };

    if let Some(error) = parsed.error {
        return LineEvent::Failed(error);
    }

    if parsed.done {
        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (prompt, completion) => {
                let prompt = prompt.unwrap_or(0);
                let completion = completion.unwrap_or(0);
                Some(Usage {
                    prompt_tokens: prompt,
                    completion_tokens: completion,
                    total_tokens: prompt + completion,
                })
            }
        };
        // The terminal line can still carry trailing text.
        return match parsed.message.map(|m| m.content).filter(|c| !c.is_empty()) {
            Some(text) => LineEvent::Chunk(StreamChunk {
                content: Some(text),
                done: true,
                usage,
            }),
            None => LineEvent::Chunk(StreamChunk::finished(usage)),
        };
    }

    match parsed.message.map(|m| m.content).filter(|c| !c.is_empty()) {
        Some(text) => LineEvent::Chunk(StreamChunk::text(text)),
        None => LineEvent::Skip,
    }
}

#[async_trait]
impl dataclaw_core::Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::request_body(&request);

        debug!(provider = "ollama", model = %request.model, "Sending streaming request");

        let response = http::send(self.client.post(&url).json(&body), self.timeouts.idle).await?;
        let response = http::check_status("ollama", &request.model, response).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let idle = self.timeouts.idle;

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            loop {
                let bytes = match http::next_fragment("ollama", &mut byte_stream, &tx, idle).await {
                    Fetched::Bytes(bytes) => bytes,
                    Fetched::End => break,
                    Fetched::Stop => return,
                };

                lines.push(&bytes);
                while let Some(line) = lines.next_line() {
                    match decode_line(&line) {
                        LineEvent::Skip => {}
                        LineEvent::Failed(message) => {
                            let _ = tx.send(Err(ProviderError::StreamInterrupted(message))).await;
                            return;
                        }
                        LineEvent::Chunk(chunk) => {
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

            if let Some(tail) = lines.finish() {
                if let LineEvent::Chunk(chunk) = decode_line(&tail) {
                    let done = chunk.done;
                    if tx.send(Ok(chunk)).await.is_err() || done {
                        return;
                    }
                }
            }

            // Body ended without a done marker.
            let _ = tx.send(Ok(StreamChunk::finished(None))).await;
        });

        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = http::send(self.client.get(&url), self.timeouts.idle).await?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = http::send(self.client.get(&url), self.timeouts.connect).await?;
        Ok(response.status().is_success())
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}
