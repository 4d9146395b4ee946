//! entigate client - remote backend engines over NNG.
//!
//! Each backend source is served by an engine listening on an NNG REP
//! socket. [`RemoteBackend`] dials one REQ socket per source and implements
//! the core [`QueryBackend`](entigate_core::backend::QueryBackend) seam, so
//! the gateway executor can run against live engines.
//!
//! Requests and responses are length-prefixed JSON
//! [`BackendRequest`](entigate_proto::BackendRequest) /
//! [`BackendResponse`](entigate_proto::BackendResponse) envelopes, matched by
//! request id.

pub mod client;
pub mod connection;
pub mod engine;
pub mod error;

pub use client::RemoteBackend;
pub use connection::{Connection, ConnectionState};
pub use engine::EngineConfig;
pub use error::Error;

/// Re-export protocol types.
pub use entigate_proto as proto;
