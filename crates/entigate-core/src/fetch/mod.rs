//! Entity fetchers.
//!
//! One [`EntityFetcher`] exists per backend source kind. Each translates a
//! source-scoped [`EntitiesRequest`] into backend queries and folds the rows
//! into an [`EntityFetcherResponse`] keyed by [`EntityKey`].

mod convert;
mod entity_store;
mod filter;
mod interaction;
mod key;
mod query_service;
mod response;

pub use convert::{attribute_value, avg_rate, convert_value, metric_health, metric_value_kind, NULL_STRING};
pub use entity_store::EntityStoreFetcher;
pub use filter::{
    align_down, align_up, analytic_query_filter, count_placeholder, entity_keys_filter,
    non_null_ids_filter, time_bucket_expression, time_range_filter, COUNT_COLUMN_NAME,
    DEFAULT_GROUP_BY_LIMIT,
};
pub use interaction::{
    InteractionDirection, InteractionFetcher, FROM_ENTITY_ID_ATTRIBUTE_ID,
    FROM_ENTITY_TYPE_ATTRIBUTE_ID, TO_ENTITY_ID_ATTRIBUTE_ID, TO_ENTITY_TYPE_ATTRIBUTE_ID,
};
pub use key::EntityKey;
pub use query_service::QueryServiceEntityFetcher;
pub use response::EntityFetcherResponse;

use async_trait::async_trait;
use tracing::warn;

use entigate_proto::{
    AttributeSource, EntitiesRequest, Entity, Expression, FunctionExpression, ResultSetChunk,
    ResultSetMetadata, Value,
};

use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Source-specific entity fetching.
///
/// The request passed in is already scoped to this fetcher's source: its
/// selections, time aggregations and filter only reference attributes the
/// source can serve.
#[async_trait]
pub trait EntityFetcher: Send + Sync {
    /// The source this fetcher queries.
    fn source(&self) -> AttributeSource;

    /// Plain attribute selections, grouped by entity.
    async fn get_entities(&self, ctx: &RequestContext, request: &EntitiesRequest) -> Result<EntityFetcherResponse>;

    /// Aggregated metric selections over the request window.
    async fn get_aggregated_metrics(
        &self,
        _ctx: &RequestContext,
        _request: &EntitiesRequest,
    ) -> Result<EntityFetcherResponse> {
        Err(Error::Unsupported(format!("{} does not serve aggregations", self.source())))
    }

    /// Time-bucketed metric series.
    async fn get_time_aggregated_metrics(
        &self,
        _ctx: &RequestContext,
        _request: &EntitiesRequest,
    ) -> Result<EntityFetcherResponse> {
        Err(Error::Unsupported(format!("{} does not serve time series", self.source())))
    }

    /// Number of distinct entities matching the request.
    async fn count_entities(&self, _ctx: &RequestContext, _request: &EntitiesRequest) -> Result<u64> {
        Err(Error::Unsupported(format!("{} does not serve entity counts", self.source())))
    }
}

/// Identity attributes are always populated so later steps can join on them.
pub(crate) fn put_id_attributes(entity: &mut Entity, id_columns: &[String], key: &EntityKey) {
    for (column, value) in id_columns.iter().zip(key.parts()) {
        entity
            .attributes
            .insert(column.clone(), Value::String(value.clone()));
    }
}

/// Metadata of a chunk, warning when it is missing.
pub(crate) fn chunk_metadata(chunk: &ResultSetChunk) -> Option<&ResultSetMetadata> {
    if chunk.metadata.is_none() {
        warn!(chunk_id = chunk.chunk_id, "chunk has no result metadata, skipping the rest of the response");
    }
    chunk.metadata.as_ref()
}

/// The function as a selection whose result column is its result name.
pub(crate) fn aliased(function: &FunctionExpression) -> Expression {
    Expression::Function(FunctionExpression {
        alias: Some(function.result_name()),
        ..function.clone()
    })
}
