//! JSON response types for the HTTP gateway.

use serde::{Deserialize, Serialize};

use entigate_proto::AttributeSource;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Gateway version.
    pub version: String,
    /// Sources with a configured backend engine.
    pub sources: Vec<AttributeSource>,
}

/// Entity count response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    /// Distinct entities matching the request.
    pub total: u64,
}
