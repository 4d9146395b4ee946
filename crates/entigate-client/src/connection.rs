//! Connection to one remote backend engine.

use std::sync::atomic::{AtomicBool, Ordering};

use async_nng::AsyncContext;
use nng::options::Options;
use nng::{Message, Protocol, Socket};

use entigate_proto::framing::{decode_message, encode_message, MAX_MESSAGE_SIZE};
use entigate_proto::{AttributeSource, BackendRequest, BackendResponse};

use crate::engine::EngineConfig;
use crate::error::Error;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket dialed, requests accepted.
    Connected,
    /// Connection closed.
    Closed,
}

/// A REQ socket dialed to a backend engine.
///
/// Every request runs on its own NNG context, so concurrent requests share
/// the socket without serializing on it.
pub struct Connection {
    socket: Socket,
    config: EngineConfig,
    closed: AtomicBool,
}

impl Connection {
    /// Dial the engine at `config.address`.
    pub fn establish(config: EngineConfig) -> Result<Self, Error> {
        let socket = Socket::new(Protocol::Req0)
            .map_err(|e| Error::Connection(format!("failed to create socket: {}", e)))?;

        socket
            .set_opt::<nng::options::RecvMaxSize>(MAX_MESSAGE_SIZE)
            .map_err(|e| Error::Connection(format!("failed to set max message size: {}", e)))?;
        socket
            .set_opt::<nng::options::SendTimeout>(Some(config.timeout))
            .map_err(|e| Error::Connection(format!("failed to set send timeout: {}", e)))?;
        socket
            .set_opt::<nng::options::RecvTimeout>(Some(config.timeout))
            .map_err(|e| Error::Connection(format!("failed to set recv timeout: {}", e)))?;

        socket
            .dial(&config.address)
            .map_err(|e| Error::Connection(format!("failed to connect to {}: {}", config.address, e)))?;

        Ok(Self {
            socket,
            config,
            closed: AtomicBool::new(false),
        })
    }

    fn create_context(&self) -> Result<AsyncContext<'_>, Error> {
        AsyncContext::try_from(&self.socket)
            .map_err(|e| Error::Connection(format!("failed to create async context: {}", e)))
    }

    /// Send a request and wait for the matching response.
    pub async fn send_request(&self, request: &BackendRequest) -> Result<BackendResponse, Error> {
        if self.state() == ConnectionState::Closed {
            return Err(Error::Connection("connection is closed".to_string()));
        }

        let framed = encode_message(request)?;
        if framed.len() > MAX_MESSAGE_SIZE {
            return Err(Error::Protocol(entigate_proto::Error::InvalidMessage(format!(
                "request too large: {} bytes (max: {})",
                framed.len(),
                MAX_MESSAGE_SIZE
            ))));
        }

        let mut ctx = self.create_context()?;
        let timeout = self.config.timeout;
        ctx.send(Message::from(framed.as_slice()), Some(timeout))
            .await
            .map_err(|(_, e)| match e {
                nng::Error::TimedOut => Error::Timeout(timeout),
                _ => Error::Connection(format!("failed to send request: {}", e)),
            })?;

        let reply = ctx.receive(Some(timeout)).await.map_err(|e| match e {
            nng::Error::TimedOut => Error::Timeout(timeout),
            _ => Error::Connection(format!("failed to receive response: {}", e)),
        })?;

        let response: BackendResponse = decode_message(reply.as_slice())?;
        if response.id != request.id {
            return Err(Error::Protocol(entigate_proto::Error::InvalidMessage(format!(
                "response ID mismatch: expected {}, got {}",
                request.id, response.id
            ))));
        }
        Ok(response)
    }

    /// Close the connection. Later requests fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        if self.closed.load(Ordering::SeqCst) {
            ConnectionState::Closed
        } else {
            ConnectionState::Connected
        }
    }

    /// Source served by the engine.
    pub fn source(&self) -> AttributeSource {
        self.config.source
    }

    /// Address this connection dialed.
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Send and receive timeout.
    pub fn timeout(&self) -> std::time::Duration {
        self.config.timeout
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("source", &self.config.source)
            .field("address", &self.config.address)
            .field("state", &self.state())
            .finish()
    }
}
