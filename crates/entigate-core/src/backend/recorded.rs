//! Scripted backend for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;

use entigate_proto::{AttributeSource, QueryRequest, ResultSetChunk};

use super::{ChunkStream, QueryBackend};
use crate::context::RequestContext;
use crate::error::{Error, Result};

type Scripted = std::result::Result<Vec<ResultSetChunk>, String>;

/// A [`QueryBackend`] that replays scripted responses per source and records
/// every query it receives.
///
/// Responses are consumed in FIFO order. A source with no scripted response
/// left answers with an empty result.
#[derive(Debug, Default)]
pub struct RecordedBackend {
    responses: Mutex<HashMap<AttributeSource, VecDeque<Scripted>>>,
    requests: Mutex<Vec<(AttributeSource, QueryRequest)>>,
    delay: Option<Duration>,
}

impl RecordedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful response for `source`.
    pub fn push_chunks(&self, source: AttributeSource, chunks: Vec<ResultSetChunk>) {
        self.responses
            .lock()
            .entry(source)
            .or_default()
            .push_back(Ok(chunks));
    }

    /// Queue a failure for `source`.
    pub fn push_error(&self, source: AttributeSource, message: impl Into<String>) {
        self.responses
            .lock()
            .entry(source)
            .or_default()
            .push_back(Err(message.into()));
    }

    /// Every query received so far, in arrival order.
    pub fn requests(&self) -> Vec<(AttributeSource, QueryRequest)> {
        self.requests.lock().clone()
    }

    /// Queries received for `source`.
    pub fn requests_for(&self, source: AttributeSource) -> Vec<QueryRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|(s, _)| *s == source)
            .map(|(_, q)| q.clone())
            .collect()
    }
}

#[async_trait]
impl QueryBackend for RecordedBackend {
    async fn execute(
        &self,
        source: AttributeSource,
        _ctx: &RequestContext,
        query: QueryRequest,
    ) -> Result<ChunkStream> {
        self.requests.lock().push((source, query));
        let scripted = self
            .responses
            .lock()
            .get_mut(&source)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(Vec::new()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let chunks = scripted.map_err(Error::Backend)?;
        Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}
