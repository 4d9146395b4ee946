//! Entity request execution.
//!
//! The executor classifies a request with an [`ExecutionContext`], routes
//! each part to the fetcher of a source able to serve it, merges the partial
//! results by entity key, attaches interactions and finally sorts and pages
//! the merged entities in memory.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, instrument, warn};

use entigate_proto::{AttributeSource, EntitiesRequest, EntitiesResponse, Expression};

use super::context::ExecutionContext;
use super::selector::{
    has_entity_id_equals_filter, single_source_for_all_attributes, source_sets_for_filter_and_order_by,
    sources_for_filter,
};
use super::sort::{paginate, sort_entities};
use super::validate::{validate_count_request, validate_request, with_default_aliases};
use crate::backend::BackendClient;
use crate::catalog::AttributeCatalog;
use crate::config::EntityTypeConfigs;
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::fetch::{
    entity_keys_filter, EntityFetcher, EntityFetcherResponse, EntityKey, EntityStoreFetcher,
    InteractionFetcher, QueryServiceEntityFetcher,
};

/// Runs entity requests against the registered source fetchers.
pub struct EntityQueryExecutor {
    catalog: Arc<dyn AttributeCatalog>,
    configs: Arc<EntityTypeConfigs>,
    fetchers: BTreeMap<AttributeSource, Arc<dyn EntityFetcher>>,
    interactions: InteractionFetcher,
}

impl EntityQueryExecutor {
    /// Executor with the analytic store and entity store fetchers sharing
    /// `client`.
    pub fn new(client: BackendClient, catalog: Arc<dyn AttributeCatalog>, configs: Arc<EntityTypeConfigs>) -> Self {
        let interactions = InteractionFetcher::new(client.clone(), catalog.clone(), configs.clone());
        let executor = Self {
            catalog: catalog.clone(),
            configs: configs.clone(),
            fetchers: BTreeMap::new(),
            interactions,
        };
        executor
            .with_fetcher(Arc::new(QueryServiceEntityFetcher::new(
                client.clone(),
                catalog.clone(),
                configs.clone(),
            )))
            .with_fetcher(Arc::new(EntityStoreFetcher::new(client, catalog, configs)))
    }

    /// Register `fetcher` for its source, replacing any previous one.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn EntityFetcher>) -> Self {
        self.fetchers.insert(fetcher.source(), fetcher);
        self
    }

    /// Execute an entities request.
    #[instrument(skip_all, fields(tenant = %ctx.tenant_id, entity_type = %request.entity_type))]
    pub async fn execute(&self, ctx: &RequestContext, request: EntitiesRequest) -> Result<EntitiesResponse> {
        validate_request(&request)?;
        let request = with_default_aliases(request);

        let ids = self.configs.id_attributes(&request.entity_type)?.to_vec();
        let attributes = self.catalog.attributes(ctx, &request.entity_type)?;
        let mut plan = ExecutionContext::new(&attributes, &ids, &request)?;

        let mut response = match single_source_for_all_attributes(&plan) {
            Some(source) => {
                debug!(%source, "request served by a single source");
                let scoped = plan.claim_source_request(source, request.filter.clone());
                self.fetch_source(ctx, source, &scoped).await?
            }
            None => self.fetch_across_sources(ctx, &request, &mut plan).await?,
        };

        self.interactions.populate(ctx, &request, &mut response).await?;

        let mut entities = response.into_entities();
        let total = entities.len() as u64;
        sort_entities(&mut entities, plan.order_by());
        paginate(&mut entities, request.limit, request.offset);
        debug!(total, returned = entities.len(), "request complete");

        Ok(EntitiesResponse { entities, total })
    }

    /// Number of distinct entities matching the request filter over its
    /// window, counted by the analytic store.
    #[instrument(skip_all, fields(tenant = %ctx.tenant_id, entity_type = %request.entity_type))]
    pub async fn count(&self, ctx: &RequestContext, request: EntitiesRequest) -> Result<u64> {
        validate_count_request(&request)?;
        self.fetcher(AttributeSource::Qs)?
            .count_entities(ctx, &request)
            .await
    }

    fn fetcher(&self, source: AttributeSource) -> Result<&Arc<dyn EntityFetcher>> {
        self.fetchers
            .get(&source)
            .ok_or_else(|| Error::Internal(format!("no fetcher registered for {}", source)))
    }

    /// Resolve a request no single source can answer.
    ///
    /// One source drives the fetch with the request filter. Every other
    /// pending source is then queried for the driver's entity keys only.
    async fn fetch_across_sources(
        &self,
        ctx: &RequestContext,
        request: &EntitiesRequest,
        plan: &mut ExecutionContext,
    ) -> Result<EntityFetcherResponse> {
        let ids = plan.id_attributes().to_vec();

        let filter_on_ids_only = request
            .filter
            .as_ref()
            .is_some_and(|f| f.attribute_ids().iter().all(|a| ids.contains(a)));
        if filter_on_ids_only && has_entity_id_equals_filter(plan) {
            debug!("filter pins one entity, querying every source with it");
            let scoped: Vec<_> = plan
                .pending_sources()
                .into_iter()
                .map(|source| (source, plan.claim_source_request(source, request.filter.clone())))
                .collect();
            return self.fetch_all(ctx, scoped).await;
        }

        let candidates = if plan.filter().is_some() {
            let sources = sources_for_filter(plan);
            if sources.is_empty() {
                return Err(Error::InvalidArgument(
                    "no single source can evaluate every filter attribute".to_string(),
                ));
            }
            sources
        } else {
            let referenced = plan.pending_sources();
            if referenced.is_empty() {
                [AttributeSource::Qs].into_iter().collect()
            } else {
                referenced
            }
        };
        let preferred = source_sets_for_filter_and_order_by(plan);
        let driver = candidates
            .iter()
            .find(|s| preferred.contains(s))
            .or_else(|| candidates.iter().next())
            .copied()
            .unwrap_or(AttributeSource::Qs);
        debug!(%driver, "driving source selected");

        let scoped = plan.claim_source_request(driver, request.filter.clone());
        let mut response = self.fetch_source(ctx, driver, &scoped).await?;

        // Identity values come from the entity keys.
        for source in plan.pending_sources() {
            plan.remove_selection_attributes(source, &ids);
        }
        if plan.is_complete() || response.is_empty() {
            return Ok(response);
        }

        let keys: Vec<EntityKey> = response.keys().cloned().collect();
        let key_filter = entity_keys_filter(&ids, &keys);
        let scoped: Vec<_> = plan
            .pending_sources()
            .into_iter()
            .map(|source| (source, plan.claim_source_request(source, Some(key_filter.clone()))))
            .collect();
        response.merge(self.fetch_all(ctx, scoped).await?);
        Ok(response)
    }

    /// Fetch several scoped requests concurrently and merge them in source
    /// order. Requests left with nothing to fetch are skipped.
    async fn fetch_all(
        &self,
        ctx: &RequestContext,
        scoped: Vec<(AttributeSource, EntitiesRequest)>,
    ) -> Result<EntityFetcherResponse> {
        let fetches = scoped
            .iter()
            .filter(|(_, r)| !r.selection.is_empty() || !r.time_aggregation.is_empty())
            .map(|(source, r)| self.fetch_source(ctx, *source, r));

        let mut response = EntityFetcherResponse::new();
        for partial in try_join_all(fetches).await? {
            response.merge(partial);
        }
        Ok(response)
    }

    /// Run the fetcher operations `scoped` needs on `source`.
    ///
    /// Entities are fetched when there are plain non-identity selections, or
    /// when nothing else would produce the entity keys. A source that cannot
    /// serve aggregations or series drops them with a warning.
    async fn fetch_source(
        &self,
        ctx: &RequestContext,
        source: AttributeSource,
        scoped: &EntitiesRequest,
    ) -> Result<EntityFetcherResponse> {
        let fetcher = self.fetcher(source)?;
        let ids = self.configs.id_attributes(&scoped.entity_type)?;

        let has_metrics = scoped.selection.iter().any(Expression::is_function);
        let has_series = !scoped.time_aggregation.is_empty();
        let has_plain = scoped
            .selection
            .iter()
            .filter_map(Expression::attribute_id)
            .any(|id| !ids.iter().any(|c| c == id));

        let mut response = EntityFetcherResponse::new();
        if has_plain || (!has_metrics && !has_series) {
            response.merge(fetcher.get_entities(ctx, scoped).await?);
        }
        if has_metrics {
            match fetcher.get_aggregated_metrics(ctx, scoped).await {
                Ok(partial) => response.merge(partial),
                Err(Error::Unsupported(reason)) => warn!(%source, %reason, "dropping aggregations"),
                Err(e) => return Err(e),
            }
        }
        if has_series {
            match fetcher.get_time_aggregated_metrics(ctx, scoped).await {
                Ok(partial) => response.merge(partial),
                Err(Error::Unsupported(reason)) => warn!(%source, %reason, "dropping time aggregations"),
                Err(e) => return Err(e),
            }
        }
        Ok(response)
    }
}
