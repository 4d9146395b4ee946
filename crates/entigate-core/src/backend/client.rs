//! Deadline-bound chunk collection.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::debug;

use entigate_proto::{AttributeSource, QueryRequest, ResultSetChunk};

use super::QueryBackend;
use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Default per-call deadline.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_millis(5000);

/// Executes queries on a [`QueryBackend`] under a fixed per-call deadline.
#[derive(Clone)]
pub struct BackendClient {
    backend: Arc<dyn QueryBackend>,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `query` and collect its chunks.
    ///
    /// Consumption stops at the first chunk without rows; anything the
    /// backend sends after it is dropped. Exceeding the deadline fails the
    /// call with [`Error::Timeout`].
    pub async fn execute(
        &self,
        source: AttributeSource,
        ctx: &RequestContext,
        query: QueryRequest,
    ) -> Result<Vec<ResultSetChunk>> {
        debug!(%source, tenant = %ctx.tenant_id, ?query, "sending query");
        tokio::time::timeout(self.timeout, self.collect(source, ctx, query))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }

    async fn collect(
        &self,
        source: AttributeSource,
        ctx: &RequestContext,
        query: QueryRequest,
    ) -> Result<Vec<ResultSetChunk>> {
        let mut stream = self.backend.execute(source, ctx, query).await?;
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            debug!(%source, chunk_id = chunk.chunk_id, rows = chunk.rows.len(), "received chunk");
            if chunk.is_empty() {
                break;
            }
            let last = chunk.is_last_chunk;
            chunks.push(chunk);
            if last {
                break;
            }
        }
        Ok(chunks)
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordedBackend;
    use entigate_proto::{ColumnMetadata, ResultSetMetadata, Row, Value, ValueType};

    fn chunk(id: u32, rows: Vec<&str>) -> ResultSetChunk {
        let metadata = ResultSetMetadata::new(vec![ColumnMetadata::new("API.id", ValueType::String)]);
        ResultSetChunk::new(
            id,
            metadata,
            rows.into_iter().map(|r| Row::new(vec![Value::from(r)])).collect(),
        )
    }

    #[tokio::test]
    async fn test_stops_at_first_empty_chunk() {
        let backend = Arc::new(RecordedBackend::new());
        backend.push_chunks(
            AttributeSource::Qs,
            vec![chunk(0, vec!["a"]), chunk(1, vec![]), chunk(2, vec!["b"])],
        );
        let client = BackendClient::new(backend.clone());

        let chunks = client
            .execute(AttributeSource::Qs, &RequestContext::new("t"), QueryRequest::default())
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout() {
        let backend = Arc::new(RecordedBackend::new().with_delay(Duration::from_millis(200)));
        backend.push_chunks(AttributeSource::Qs, vec![chunk(0, vec!["a"])]);
        let client = BackendClient::new(backend).with_timeout(Duration::from_millis(10));

        let result = client
            .execute(AttributeSource::Qs, &RequestContext::new("t"), QueryRequest::default())
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let backend = Arc::new(RecordedBackend::new());
        backend.push_error(AttributeSource::Eds, "store unavailable");
        let client = BackendClient::new(backend);

        let result = client
            .execute(AttributeSource::Eds, &RequestContext::new("t"), QueryRequest::default())
            .await;
        assert!(matches!(result, Err(Error::Backend(msg)) if msg == "store unavailable"));
    }
}
