//! Fetcher backed by the entity key-value store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use entigate_proto::{AttributeSource, EntitiesRequest, Expression, QueryRequest, Value};

use super::convert::attribute_value;
use super::filter::DEFAULT_GROUP_BY_LIMIT;
use super::{chunk_metadata, put_id_attributes, EntityFetcher, EntityFetcherResponse, EntityKey};
use crate::backend::BackendClient;
use crate::catalog::AttributeCatalog;
use crate::config::EntityTypeConfigs;
use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Fetches plain attributes from the entity store.
///
/// The store keeps one record per entity, so queries are neither grouped nor
/// time-windowed. Aggregations and time series are not served here.
pub struct EntityStoreFetcher {
    client: BackendClient,
    catalog: Arc<dyn AttributeCatalog>,
    configs: Arc<EntityTypeConfigs>,
}

impl EntityStoreFetcher {
    pub fn new(client: BackendClient, catalog: Arc<dyn AttributeCatalog>, configs: Arc<EntityTypeConfigs>) -> Self {
        Self {
            client,
            catalog,
            configs,
        }
    }

    /// Query selecting the identity columns followed by every plain
    /// non-identity attribute of the request.
    pub fn build_entities_query(&self, request: &EntitiesRequest) -> Result<QueryRequest> {
        let ids = self.configs.id_attributes(&request.entity_type)?;
        if ids.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "entity type {} has no identity attributes",
                request.entity_type
            )));
        }

        let mut query = QueryRequest {
            filter: request.filter.clone(),
            limit: DEFAULT_GROUP_BY_LIMIT,
            ..Default::default()
        };
        query
            .selection
            .extend(ids.iter().map(|id| Expression::attribute(id.as_str())));
        query.selection.extend(
            request
                .selection
                .iter()
                .filter(|e| e.attribute_id().is_some_and(|id| !ids.iter().any(|c| c == id)))
                .cloned(),
        );
        Ok(query)
    }
}

#[async_trait]
impl EntityFetcher for EntityStoreFetcher {
    fn source(&self) -> AttributeSource {
        AttributeSource::Eds
    }

    async fn get_entities(&self, ctx: &RequestContext, request: &EntitiesRequest) -> Result<EntityFetcherResponse> {
        let query = self.build_entities_query(request)?;
        let ids = self.configs.id_attributes(&request.entity_type)?;
        let attributes = self.catalog.attributes(ctx, &request.entity_type)?;
        let column_to_attribute: HashMap<String, String> = request
            .selection
            .iter()
            .filter_map(|e| e.attribute_id().map(|id| (e.result_name(), id.to_string())))
            .collect();

        let chunks = self.client.execute(AttributeSource::Eds, ctx, query).await?;

        let mut response = EntityFetcherResponse::new();
        for chunk in &chunks {
            let Some(metadata) = chunk_metadata(chunk) else {
                break;
            };
            for row in &chunk.rows {
                let key = EntityKey::from_row(row, ids.len())?;
                let entity = response.entity_mut(&key, &request.entity_type);
                put_id_attributes(entity, ids, &key);

                for (i, column) in metadata.column_metadata.iter().enumerate().skip(ids.len()) {
                    let attribute_id = column_to_attribute
                        .get(&column.column_name)
                        .unwrap_or(&column.column_name);
                    let raw = row.column(i).cloned().unwrap_or(Value::Null);
                    entity
                        .attributes
                        .insert(column.column_name.clone(), attribute_value(attribute_id, &raw, &attributes)?);
                }
            }
        }
        Ok(response)
    }
}
