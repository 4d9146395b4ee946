//! Entigate HTTP/JSON gateway.
//!
//! This crate exposes the entity query executor over HTTP: callers post an
//! entities request and receive entities assembled from every backend
//! source that serves part of it. Trace listings are served alongside.

pub mod config;
pub mod error;
pub mod json;
pub mod routes;

pub use config::{Args, ConfigError, GatewayConfig, GatewayFile, LogFormat};
pub use error::AppError;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use entigate_core::{BackendClient, EntityQueryExecutor, QueryBackend, TracesService};
use entigate_proto::AttributeSource;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Request executor.
    pub executor: Arc<EntityQueryExecutor>,
    /// Trace listings.
    pub traces: Arc<TracesService>,
    /// Sources with a configured backend engine.
    pub sources: Vec<AttributeSource>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl AppState {
    /// Build the executor over `backend` from the configuration file contents.
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        sources: Vec<AttributeSource>,
        file: &GatewayFile,
        config: GatewayConfig,
    ) -> Result<Self, ConfigError> {
        let client = BackendClient::new(backend).with_timeout(config.backend_timeout);
        let catalog = Arc::new(file.catalog()?);
        let traces = TracesService::new(client.clone(), catalog.clone());
        let executor = EntityQueryExecutor::new(client, catalog, Arc::new(file.entity_type_configs()));
        Ok(Self {
            executor: Arc::new(executor),
            traces: Arc::new(traces),
            sources,
            config,
        })
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::entities::routes())
        .merge(routes::traces::routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}
