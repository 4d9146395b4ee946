//! Core error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while planning or executing an entity request.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed request or unexpected value kind.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No configuration exists for the entity type.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// The catalog has no metadata for the attribute.
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),

    /// A backend call failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// A backend call exceeded its deadline.
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    /// The source cannot serve this kind of query.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Anything else that aborts the request.
    #[error("internal error: {0}")]
    Internal(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] entigate_proto::Error),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
