//! Shared HTTP plumbing for streaming providers.

use std::fmt::Display;
use std::time::Duration;

use dataclaw_core::error::ProviderError;
use dataclaw_core::provider::StreamChunk;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub(crate) type ChunkSender = mpsc::Sender<Result<StreamChunk, ProviderError>>;

/// Timeouts applied to every generation call.
#[derive(Debug, Clone, Copy)]
pub struct StreamTimeouts {
    /// Longest wait for response headers or for the next body chunk
    pub idle: Duration,
    pub connect: Duration,
}

impl Default for StreamTimeouts {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(120),
            connect: Duration::from_secs(10),
        }
    }
}

pub(crate) fn build_client(timeouts: StreamTimeouts) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(timeouts.connect)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))
}

pub(crate) fn request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Send a request, bounding the wait for response headers by `idle`.
pub(crate) async fn send(
    builder: reqwest::RequestBuilder,
    idle: Duration,
) -> Result<reqwest::Response, ProviderError> {
    match tokio::time::timeout(idle, builder.send()).await {
        Ok(result) => result.map_err(request_error),
        Err(_) => Err(ProviderError::Timeout(format!(
            "no response within {}s",
            idle.as_secs()
        ))),
    }
}

/// Map a non-success status into a provider error, consuming the body.
pub(crate) async fn check_status(
    provider: &str,
    model: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(provider, status, body = %body, "Provider returned error");

    Err(match status {
        401 | 403 => {
            ProviderError::AuthenticationFailed("Invalid API key or insufficient permissions".into())
        }
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    })
}

/// Outcome of waiting for the next body chunk.
#[derive(Debug, PartialEq)]
pub(crate) enum Fetched<B> {
    Bytes(B),
    /// The body ended normally.
    End,
    /// The reader must stop. Any failure has already been sent on the channel.
    Stop,
}

/// Wait for the next body chunk, at most `idle`, or until the consumer
/// drops its receiver. Dropping the byte stream afterwards closes the
/// connection.
pub(crate) async fn next_fragment<S, B, E>(
    provider: &str,
    byte_stream: &mut S,
    tx: &ChunkSender,
    idle: Duration,
) -> Fetched<B>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    E: Display,
{
    let next = tokio::select! {
        _ = tx.closed() => {
            debug!(provider, "Receiver dropped, abandoning stream");
            return Fetched::Stop;
        }
        next = tokio::time::timeout(idle, byte_stream.next()) => next,
    };

    match next {
        Err(_) => {
            warn!(provider, "Stream idle timeout");
            let _ = tx
                .send(Err(ProviderError::Timeout(format!(
                    "no data for {}s",
                    idle.as_secs()
                ))))
                .await;
            Fetched::Stop
        }
        Ok(None) => Fetched::End,
        Ok(Some(Err(e))) => {
            let _ = tx
                .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                .await;
            Fetched::Stop
        }
        Ok(Some(Ok(bytes))) => Fetched::Bytes(bytes),
    }
}

/// Splits a byte stream into text lines.
///
/// Bytes are buffered until a newline arrives, so multi-byte characters
/// split across network chunks decode intact.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line[..line.len() - 1]);
        Some(text.trim_end_matches('\r').to_string())
    }

    /// Whatever trails the last newline once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}
