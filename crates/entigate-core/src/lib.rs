//! entigate core - source routing, entity fetchers and result merging.
//!
//! This crate turns an entities request into backend queries against the
//! analytic store and the entity store, and folds the answers into entities.
//! Trace listings go to the analytic store directly.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod query;
pub mod trace;

pub use backend::{BackendClient, ChunkStream, QueryBackend, RecordedBackend};
pub use catalog::{AttributeCatalog, AttributeMetadata, InMemoryAttributeCatalog, INTERACTION_SCOPE};
pub use config::{EntityTypeConfig, EntityTypeConfigs, InteractionConfig, InteractionSide};
pub use context::RequestContext;
pub use error::{Error, Result};
pub use fetch::{
    EntityFetcher, EntityFetcherResponse, EntityKey, EntityStoreFetcher, InteractionDirection,
    InteractionFetcher, QueryServiceEntityFetcher,
};
pub use query::{EntityQueryExecutor, ExecutionContext};
pub use trace::TracesService;

/// Re-export protocol types.
pub use entigate_proto as proto;
