//! Client error types.

use std::time::Duration;

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] entigate_proto::Error),

    /// Request timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The engine answered with an error.
    #[error("remote error: {0}")]
    Remote(String),
}

impl From<Error> for entigate_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Timeout(after) => entigate_core::Error::Timeout(after),
            Error::Protocol(e) => entigate_core::Error::Protocol(e),
            other => entigate_core::Error::Backend(other.to_string()),
        }
    }
}
