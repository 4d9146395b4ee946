//! Backend query execution.
//!
//! [`QueryBackend`] is the seam to the backend engines. [`BackendClient`]
//! wraps one with the per-call deadline and the chunk consumption rules every
//! fetcher relies on.

mod client;
mod recorded;

pub use client::{BackendClient, DEFAULT_BACKEND_TIMEOUT};
pub use recorded::RecordedBackend;

use async_trait::async_trait;
use futures::stream::BoxStream;

use entigate_proto::{AttributeSource, QueryRequest, ResultSetChunk};

use crate::context::RequestContext;
use crate::error::Result;

/// Stream of result chunks for one query.
pub type ChunkStream = BoxStream<'static, Result<ResultSetChunk>>;

/// A backend engine able to execute source-scoped queries.
///
/// Implementations are shared by concurrent requests.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Execute `query` against `source`.
    async fn execute(
        &self,
        source: AttributeSource,
        ctx: &RequestContext,
        query: QueryRequest,
    ) -> Result<ChunkStream>;
}
