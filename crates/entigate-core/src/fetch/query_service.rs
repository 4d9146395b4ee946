//! Fetcher backed by the columnar analytic store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use entigate_proto::{
    AggregatedMetricValue, AttributeSource, EntitiesRequest, Expression, FunctionExpression,
    FunctionType, Interval, MetricSeries, Period, QueryRequest, TimeAggregation, Value, ValueType,
};

use super::convert::{attribute_value, avg_rate, convert_value, metric_health, metric_value_kind};
use super::filter::{
    align_down, align_up, analytic_query_filter, count_placeholder, time_bucket_expression,
    COUNT_COLUMN_NAME, DEFAULT_GROUP_BY_LIMIT,
};
use super::{aliased, chunk_metadata, put_id_attributes, EntityFetcher, EntityFetcherResponse, EntityKey};
use crate::backend::BackendClient;
use crate::catalog::AttributeCatalog;
use crate::config::EntityTypeConfigs;
use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Fetches entities, aggregations and time series from the analytic store.
///
/// Every query is grouped by the entity's identity columns, restricted to
/// the request window and to non-null ids, and reports the identity columns
/// first in each row.
pub struct QueryServiceEntityFetcher {
    client: BackendClient,
    catalog: Arc<dyn AttributeCatalog>,
    configs: Arc<EntityTypeConfigs>,
}

impl QueryServiceEntityFetcher {
    pub fn new(client: BackendClient, catalog: Arc<dyn AttributeCatalog>, configs: Arc<EntityTypeConfigs>) -> Self {
        Self {
            client,
            catalog,
            configs,
        }
    }

    fn id_columns(&self, entity_type: &str) -> Result<&[String]> {
        let ids = self.configs.id_attributes(entity_type)?;
        if ids.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "entity type {} has no identity attributes",
                entity_type
            )));
        }
        Ok(ids)
    }

    /// Grouped query selecting the identity columns and every plain
    /// non-identity attribute of the request.
    pub fn build_entities_query(&self, request: &EntitiesRequest) -> Result<QueryRequest> {
        let ids = self.id_columns(&request.entity_type)?;
        let timestamp = self.configs.timestamp_attribute(&request.entity_type)?;

        let mut query = QueryRequest::default()
            .with_filter(analytic_query_filter(
                request.filter.as_ref(),
                timestamp,
                request.start_time_millis,
                request.end_time_millis,
                ids,
            ))
            .with_limit(DEFAULT_GROUP_BY_LIMIT);
        push_id_group_by(&mut query, ids);

        for expression in &request.selection {
            let Some(attribute_id) = expression.attribute_id() else {
                continue;
            };
            if ids.iter().any(|id| id == attribute_id) {
                continue;
            }
            query.selection.push(expression.clone());
            query.group_by.push(expression.clone());
        }

        // Grouped queries need at least one aggregation.
        query.selection.push(count_placeholder(&ids[0]));
        Ok(query)
    }

    /// Grouped query computing the request's function selections per entity.
    pub fn build_aggregated_metrics_query(&self, request: &EntitiesRequest) -> Result<QueryRequest> {
        let ids = self.id_columns(&request.entity_type)?;
        let timestamp = self.configs.timestamp_attribute(&request.entity_type)?;

        let mut query = QueryRequest::default()
            .with_filter(analytic_query_filter(
                request.filter.as_ref(),
                timestamp,
                request.start_time_millis,
                request.end_time_millis,
                ids,
            ))
            .with_limit(DEFAULT_GROUP_BY_LIMIT);
        push_id_group_by(&mut query, ids);
        query.selection.extend(
            request
                .selection
                .iter()
                .filter_map(Expression::as_function)
                .map(aliased),
        );
        Ok(query)
    }

    /// Grouped query for one batch of same-period time aggregations.
    ///
    /// The window is widened to period boundaries and rows are grouped by
    /// identity, then by time bucket.
    pub fn build_time_series_query(
        &self,
        request: &EntitiesRequest,
        period: Period,
        batch: &[&TimeAggregation],
    ) -> Result<QueryRequest> {
        let ids = self.id_columns(&request.entity_type)?;
        let timestamp = self.configs.timestamp_attribute(&request.entity_type)?;
        let period_millis = period.as_millis();
        if period_millis <= 0 {
            return Err(Error::InvalidArgument(format!("invalid period {:?}", period)));
        }

        let mut query = QueryRequest::default()
            .with_filter(analytic_query_filter(
                request.filter.as_ref(),
                timestamp,
                align_down(request.start_time_millis, period_millis),
                align_up(request.end_time_millis, period_millis),
                ids,
            ))
            .with_limit(DEFAULT_GROUP_BY_LIMIT);
        push_id_group_by(&mut query, ids);

        let bucket = time_bucket_expression(timestamp, period.as_secs());
        query.selection.push(bucket.clone());
        query.group_by.push(bucket);
        for aggregation in batch {
            if let Some(function) = aggregation.aggregation.as_function() {
                query.selection.push(aliased(function));
            }
        }
        Ok(query)
    }

    async fn fetch_time_series_batch(
        &self,
        ctx: &RequestContext,
        request: &EntitiesRequest,
        period: Period,
        batch: &[&TimeAggregation],
        attributes: &HashMap<String, crate::catalog::AttributeMetadata>,
        response: &mut EntityFetcherResponse,
    ) -> Result<()> {
        let ids = self.id_columns(&request.entity_type)?;
        let by_alias: HashMap<String, &FunctionExpression> = batch
            .iter()
            .filter_map(|agg| agg.aggregation.as_function())
            .map(|function| (function.result_name(), function))
            .collect();

        let query = self.build_time_series_query(request, period, batch)?;
        let chunks = self.client.execute(AttributeSource::Qs, ctx, query).await?;
        let period_millis = period.as_millis();

        for chunk in &chunks {
            let Some(metadata) = chunk_metadata(chunk) else {
                break;
            };
            for row in &chunk.rows {
                let key = EntityKey::from_row(row, ids.len())?;
                let start = bucket_start(row.column(ids.len()))?;
                let end = start + period_millis;

                let entity = response.entity_mut(&key, &request.entity_type);
                put_id_attributes(entity, ids, &key);

                for (i, column) in metadata.column_metadata.iter().enumerate().skip(ids.len() + 1) {
                    let Some(function) = by_alias.get(&column.column_name) else {
                        warn!(column = %column.column_name, "no time aggregation for column");
                        continue;
                    };
                    let health = metric_health(function)?;
                    let raw = row.column(i).cloned().unwrap_or(Value::Null);
                    // AVGRATE is rescaled only on the aggregated path.
                    let value = convert_value(&raw, metric_value_kind(function, attributes)?)?;

                    entity
                        .metric_series
                        .entry(column.column_name.clone())
                        .or_insert_with(|| MetricSeries::new(function.function.name(), period))
                        .values
                        .push(Interval {
                            start_time_millis: start,
                            end_time_millis: end,
                            value,
                            health,
                        });
                }
            }
        }
        Ok(())
    }
}

fn push_id_group_by(query: &mut QueryRequest, ids: &[String]) {
    for id in ids {
        let expression = Expression::attribute(id.as_str());
        query.selection.push(expression.clone());
        query.group_by.push(expression);
    }
}

fn bucket_start(value: Option<&Value>) -> Result<i64> {
    match value {
        Some(Value::String(s)) => s
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("time bucket {:?} is not an epoch millis value", s))),
        Some(Value::Long(v)) | Some(Value::Timestamp(v)) => Ok(*v),
        Some(other) => Err(Error::InvalidArgument(format!(
            "expected STRING time bucket but received {:?}",
            other.value_type()
        ))),
        None => Err(Error::Backend("time series row has no time bucket column".to_string())),
    }
}

#[async_trait]
impl EntityFetcher for QueryServiceEntityFetcher {
    fn source(&self) -> AttributeSource {
        AttributeSource::Qs
    }

    async fn get_entities(&self, ctx: &RequestContext, request: &EntitiesRequest) -> Result<EntityFetcherResponse> {
        let ids = self.id_columns(&request.entity_type)?;
        let attributes = self.catalog.attributes(ctx, &request.entity_type)?;
        let column_to_attribute: HashMap<String, String> = request
            .selection
            .iter()
            .filter_map(|e| e.attribute_id().map(|id| (e.result_name(), id.to_string())))
            .collect();

        let query = self.build_entities_query(request)?;
        let chunks = self.client.execute(AttributeSource::Qs, ctx, query).await?;

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
                    if column.column_name == COUNT_COLUMN_NAME {
                        continue;
                    }
                    let attribute_id = column_to_attribute
                        .get(&column.column_name)
                        .unwrap_or(&column.column_name);
                    let raw = row.column(i).cloned().unwrap_or(Value::Null);
                    let value = attribute_value(attribute_id, &raw, &attributes)?;
                    entity.attributes.insert(column.column_name.clone(), value);
                }
            }
        }
        Ok(response)
    }

    async fn get_aggregated_metrics(
        &self,
        ctx: &RequestContext,
        request: &EntitiesRequest,
    ) -> Result<EntityFetcherResponse> {
        let by_alias: HashMap<String, &FunctionExpression> = request
            .selection
            .iter()
            .filter_map(Expression::as_function)
            .map(|function| (function.result_name(), function))
            .collect();
        if by_alias.is_empty() {
            return Ok(EntityFetcherResponse::new());
        }

        let ids = self.id_columns(&request.entity_type)?;
        let attributes = self.catalog.attributes(ctx, &request.entity_type)?;
        let query = self.build_aggregated_metrics_query(request)?;
        let chunks = self.client.execute(AttributeSource::Qs, ctx, query).await?;

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
                    let Some(function) = by_alias.get(&column.column_name) else {
                        warn!(column = %column.column_name, "no aggregation for column");
                        continue;
                    };
                    let health = metric_health(function)?;
                    let raw = row.column(i).cloned().unwrap_or(Value::Null);
                    let value = if function.function == FunctionType::AvgRate {
                        avg_rate(function, &raw, request.start_time_millis, request.end_time_millis)?
                    } else {
                        convert_value(&raw, metric_value_kind(function, &attributes)?)?
                    };
                    entity.metrics.insert(
                        column.column_name.clone(),
                        AggregatedMetricValue::new(function.function.name(), value).with_health(health),
                    );
                }
            }
        }
        Ok(response)
    }

    async fn get_time_aggregated_metrics(
        &self,
        ctx: &RequestContext,
        request: &EntitiesRequest,
    ) -> Result<EntityFetcherResponse> {
        let attributes = self.catalog.attributes(ctx, &request.entity_type)?;

        // One query per distinct period; a grouped query has a single bucket width.
        let mut by_period: BTreeMap<Period, Vec<&TimeAggregation>> = BTreeMap::new();
        for aggregation in &request.time_aggregation {
            by_period.entry(aggregation.period).or_default().push(aggregation);
        }

        let mut response = EntityFetcherResponse::new();
        for (period, batch) in by_period {
            self.fetch_time_series_batch(ctx, request, period, &batch, &attributes, &mut response)
                .await?;
        }

        let keys: Vec<EntityKey> = response.keys().cloned().collect();
        for key in keys {
            if let Some(entity) = response.get_mut(&key) {
                for series in entity.metric_series.values_mut() {
                    series.sort_by_start();
                }
            }
        }
        Ok(response)
    }

    async fn count_entities(&self, ctx: &RequestContext, request: &EntitiesRequest) -> Result<u64> {
        let ids = self.id_columns(&request.entity_type)?;
        let timestamp = self.configs.timestamp_attribute(&request.entity_type)?;
        let query = QueryRequest::default()
            .with_filter(analytic_query_filter(
                request.filter.as_ref(),
                timestamp,
                request.start_time_millis,
                request.end_time_millis,
                ids,
            ))
            .with_selection(
                Expression::aggregate(FunctionType::DistinctCount, ids[0].as_str())
                    .with_alias(COUNT_COLUMN_NAME),
            );

        let chunks = self.client.execute(AttributeSource::Qs, ctx, query).await?;
        let rows: Vec<_> = chunks.iter().flat_map(|chunk| chunk.rows.iter()).collect();
        let columns = chunks
            .first()
            .and_then(|chunk| chunk.metadata.as_ref())
            .map(|m| m.column_count())
            .unwrap_or(0);

        if rows.len() != 1 || columns != 1 || rows[0].columns.len() != 1 {
            error!(
                rows = rows.len(),
                columns,
                entity_type = %request.entity_type,
                "unexpected shape for entity count result, reporting 0"
            );
            return Ok(0);
        }

        match convert_value(&rows[0].columns[0], ValueType::Long) {
            Ok(Value::Long(count)) => Ok(count.max(0) as u64),
            other => {
                error!(value = ?other, "entity count is not a number, reporting 0");
                Ok(0)
            }
        }
    }
}
