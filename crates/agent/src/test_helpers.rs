//! Shared test doubles for router, assembler, and orchestrator tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dataclaw_core::error::{ProviderError, RetrievalError, WarehouseError};
use dataclaw_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk};
use dataclaw_core::retrieval::{RetrievedDocument, Retriever};
use dataclaw_core::warehouse::{QueryResult, SqlBackend, TableColumns};
use tokio::sync::mpsc;

/// A retriever that records how often and with which `top_k` it was called.
pub struct CountingRetriever {
    docs: Vec<RetrievedDocument>,
    fail: bool,
    calls: AtomicUsize,
    last_top_k: Mutex<Option<usize>>,
}

impl CountingRetriever {
    pub fn empty() -> Self {
        Self::with_docs(&[])
    }

    pub fn with_docs(docs: &[(&str, &str)]) -> Self {
        Self {
            docs: docs
                .iter()
                .map(|(source, text)| RetrievedDocument::new(*text, *source))
                .collect(),
            fail: false,
            calls: AtomicUsize::new(0),
            last_top_k: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::empty()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_top_k(&self) -> Option<usize> {
        *self.last_top_k.lock().unwrap()
    }
}

#[async_trait]
impl Retriever for CountingRetriever {
    fn name(&self) -> &str {
        "counting"
    }

    async fn search(
        &self,
        _query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_top_k.lock().unwrap() = Some(top_k);
        if self.fail {
            return Err(RetrievalError::Unavailable("connection refused".into()));
        }
        Ok(self.docs.iter().take(top_k).cloned().collect())
    }
}

/// What a [`ScriptedProvider`] does after its fragments run out.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    Done,
    Fail,
    /// Keep the stream open until the consumer goes away.
    Stall,
}

/// Streams a fixed list of fragments and records every request.
pub struct ScriptedProvider {
    fragments: Vec<String>,
    ending: Ending,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(fragments: &[&str], ending: Ending) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ending,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(fragments: &[&str]) -> Self {
        Self::new(fragments, Ending::Done)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);

        let (tx, rx) = mpsc::channel(4);
        let fragments = self.fragments.clone();
        let ending = self.ending;
        tokio::spawn(async move {
            for f in fragments {
                if tx.send(Ok(StreamChunk::text(f))).await.is_err() {
                    return;
                }
            }
            match ending {
                Ending::Done => {
                    let _ = tx.send(Ok(StreamChunk::finished(None))).await;
                }
                Ending::Fail => {
                    let _ = tx
                        .send(Err(ProviderError::Timeout("no data for 120s".into())))
                        .await;
                }
                Ending::Stall => tx.closed().await,
            }
        });
        Ok(rx)
    }
}

/// A SQLite-flavoured warehouse with a fixed catalog.
#[derive(Default)]
pub struct FixedBackend {
    pub tables: Vec<TableColumns>,
}

impl FixedBackend {
    pub fn with_table(table: &str, columns: &[&str]) -> Self {
        Self {
            tables: vec![TableColumns {
                table: table.into(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
            }],
        }
    }
}

#[async_trait]
impl SqlBackend for FixedBackend {
    fn dialect(&self) -> &str {
        "sqlite"
    }

    async fn list_columns(&self) -> Result<Vec<TableColumns>, WarehouseError> {
        Ok(self.tables.clone())
    }

    async fn execute(&self, _sql: &str) -> Result<QueryResult, WarehouseError> {
        Ok(QueryResult::NoResultSet { rows_affected: 0 })
    }
}
