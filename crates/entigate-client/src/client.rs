//! [`QueryBackend`] over remote engines.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use entigate_core::backend::{ChunkStream, QueryBackend};
use entigate_core::RequestContext;
use entigate_proto::{AttributeSource, BackendRequest, QueryRequest};

use crate::connection::Connection;
use crate::engine::EngineConfig;
use crate::error::Error;

/// Sends source-scoped queries to one remote engine per source.
///
/// # Example
///
/// ```ignore
/// use entigate_client::{EngineConfig, RemoteBackend};
/// use entigate_proto::AttributeSource;
///
/// let backend = RemoteBackend::connect([
///     EngineConfig::new(AttributeSource::Qs, "tcp://127.0.0.1:9400"),
///     EngineConfig::new(AttributeSource::Eds, "tcp://127.0.0.1:9401"),
/// ])?;
/// ```
#[derive(Debug)]
pub struct RemoteBackend {
    connections: BTreeMap<AttributeSource, Arc<Connection>>,
    next_request_id: AtomicU64,
}

impl RemoteBackend {
    /// Dial one engine per source. A later engine for the same source
    /// replaces the earlier one.
    pub fn connect(engines: impl IntoIterator<Item = EngineConfig>) -> Result<Self, Error> {
        let mut connections = BTreeMap::new();
        for engine in engines {
            info!(%engine, timeout = ?engine.timeout, "dialing backend engine");
            let connection = Connection::establish(engine)?;
            connections.insert(connection.source(), Arc::new(connection));
        }
        Ok(Self {
            connections,
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Sources with a dialed engine.
    pub fn sources(&self) -> impl Iterator<Item = AttributeSource> + '_ {
        self.connections.keys().copied()
    }

    /// Close every connection.
    pub fn close(&self) {
        for connection in self.connections.values() {
            connection.close();
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryBackend for RemoteBackend {
    async fn execute(
        &self,
        source: AttributeSource,
        ctx: &RequestContext,
        query: QueryRequest,
    ) -> entigate_core::Result<ChunkStream> {
        let connection = self
            .connections
            .get(&source)
            .ok_or_else(|| entigate_core::Error::Backend(format!("no engine configured for {}", source)))?;

        let request = BackendRequest::new(self.next_request_id(), source, ctx.tenant_id.clone(), query);
        debug!(%source, id = request.id, address = connection.address(), "sending backend request");
        let response = connection.send_request(&request).await?;

        if let Some(message) = response.error {
            return Err(Error::Remote(message).into());
        }
        Ok(futures::stream::iter(response.chunks.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigate_proto::framing::{decode_message, encode_message};
    use entigate_proto::{
        BackendResponse, ColumnMetadata, Expression, ResultSetChunk, ResultSetMetadata, Row, Value, ValueType,
    };
    use nng::{Message, Protocol, Socket};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    /// Answer one request on `socket` with `reply`.
    fn serve_once(socket: Socket, reply: impl FnOnce(BackendRequest) -> BackendResponse + Send + 'static) {
        std::thread::spawn(move || {
            let msg = socket.recv().unwrap();
            let request: BackendRequest = decode_message(msg.as_slice()).unwrap();
            let framed = encode_message(&reply(request)).unwrap();
            socket.send(Message::from(framed.as_slice())).map_err(|(_, e)| e).unwrap();
        });
    }

    fn listen() -> (tempfile::TempDir, String, Socket) {
        let dir = tempfile::tempdir().unwrap();
        let address = format!("ipc://{}/qs.sock", dir.path().display());
        let socket = Socket::new(Protocol::Rep0).unwrap();
        socket.listen(&address).unwrap();
        (dir, address, socket)
    }

    #[tokio::test]
    async fn test_execute_round_trip() {
        let (_dir, address, socket) = listen();
        serve_once(socket, |request| {
            assert_eq!(request.source, AttributeSource::Qs);
            assert_eq!(request.tenant_id, "tenant-1");
            let metadata = ResultSetMetadata::new(vec![ColumnMetadata::new("API.id", ValueType::String)]);
            BackendResponse::ok(
                request.id,
                vec![ResultSetChunk::new(0, metadata, vec![Row::new(vec![Value::from("a1")])]).last()],
            )
        });

        let backend =
            RemoteBackend::connect([EngineConfig::new(AttributeSource::Qs, address).with_timeout(Duration::from_secs(5))])
                .unwrap();
        let query = QueryRequest::default().with_selection(Expression::attribute("API.id"));
        let chunks: Vec<_> = backend
            .execute(AttributeSource::Qs, &RequestContext::new("tenant-1"), query)
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 1);
        let chunk = chunks.into_iter().next().unwrap().unwrap();
        assert_eq!(chunk.rows[0].columns, vec![Value::from("a1")]);
    }

    #[tokio::test]
    async fn test_remote_error_becomes_backend_error() {
        let (_dir, address, socket) = listen();
        serve_once(socket, |request| BackendResponse::error(request.id, "table missing"));

        let backend = RemoteBackend::connect([EngineConfig::new(AttributeSource::Qs, address)]).unwrap();
        let result = backend
            .execute(AttributeSource::Qs, &RequestContext::new("t"), QueryRequest::default())
            .await;

        assert!(matches!(result, Err(entigate_core::Error::Backend(msg)) if msg.contains("table missing")));
    }

    #[tokio::test]
    async fn test_unconfigured_source() {
        let backend = RemoteBackend::connect(Vec::new()).unwrap();
        let result = backend
            .execute(AttributeSource::Eds, &RequestContext::new("t"), QueryRequest::default())
            .await;
        assert!(matches!(result, Err(entigate_core::Error::Backend(_))));
        assert_eq!(backend.sources().count(), 0);
    }

    #[test]
    fn test_connections_keyed_by_engine_source() {
        let (_dir, address, _socket) = listen();
        let backend = RemoteBackend::connect([EngineConfig::new(AttributeSource::Eds, address)]).unwrap();
        assert_eq!(backend.sources().collect::<Vec<_>>(), vec![AttributeSource::Eds]);
    }
}
