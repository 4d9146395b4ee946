//! Trace listings.
//!
//! A trace is a row of its scope in the analytic store: the root span's
//! attributes. Listing traces is one filtered, ordered and paged query plus
//! a separate COUNT over the same filter for the total.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error};

use entigate_proto::{
    AttributeSource, Expression, Filter, FunctionType, QueryRequest, ResultSetChunk, Trace,
    TracesRequest, TracesResponse, Value, ValueType,
};

use crate::backend::BackendClient;
use crate::catalog::{AttributeCatalog, AttributeMetadata};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::fetch::{attribute_value, chunk_metadata, convert_value, time_range_filter};

/// Key of the timestamp attribute in every trace scope.
pub const TRACE_START_TIME_KEY: &str = "startTime";

/// Lists traces from the analytic store.
pub struct TracesService {
    client: BackendClient,
    catalog: Arc<dyn AttributeCatalog>,
}

impl TracesService {
    pub fn new(client: BackendClient, catalog: Arc<dyn AttributeCatalog>) -> Self {
        Self { client, catalog }
    }

    /// The page of traces `request` selects and the number matching its
    /// filter and window.
    pub async fn get_traces(&self, ctx: &RequestContext, request: &TracesRequest) -> Result<TracesResponse> {
        validate_traces_request(request)?;
        let attributes = self.catalog.attributes(ctx, &request.scope)?;
        for id in request.selection.iter().flat_map(Expression::attribute_ids) {
            if !attributes.contains_key(&id) {
                return Err(Error::AttributeNotFound(id));
            }
        }
        let timestamp = attributes
            .values()
            .find(|a| a.key == TRACE_START_TIME_KEY)
            .map(|a| a.id.clone())
            .ok_or_else(|| Error::AttributeNotFound(format!("{}.{}", request.scope, TRACE_START_TIME_KEY)))?;
        let filter = traces_filter(request, &timestamp);

        let traces = self.filter_traces(ctx, request, filter.clone(), &attributes).await?;
        let total = self.count_traces(ctx, request, filter).await?;
        debug!(scope = %request.scope, traces = traces.len(), total, "listed traces");
        Ok(TracesResponse { traces, total })
    }

    async fn filter_traces(
        &self,
        ctx: &RequestContext,
        request: &TracesRequest,
        filter: Filter,
        attributes: &HashMap<String, AttributeMetadata>,
    ) -> Result<Vec<Trace>> {
        let mut query = QueryRequest::default().with_filter(filter);
        query.selection = request.selection.clone();
        query.order_by = request.order_by.clone();
        query.limit = request.limit;
        query.offset = request.offset;

        let chunks = self.client.execute(AttributeSource::Qs, ctx, query).await?;
        let mut traces = Vec::new();
        for chunk in &chunks {
            let Some(metadata) = chunk_metadata(chunk) else {
                break;
            };
            for row in &chunk.rows {
                let mut trace = Trace::default();
                for (i, column) in metadata.column_metadata.iter().enumerate() {
                    let raw = row.column(i).cloned().unwrap_or(Value::Null);
                    trace.attributes.insert(
                        column.column_name.clone(),
                        attribute_value(&column.column_name, &raw, attributes)?,
                    );
                }
                traces.push(trace);
            }
        }
        Ok(traces)
    }

    async fn count_traces(&self, ctx: &RequestContext, request: &TracesRequest, filter: Filter) -> Result<u64> {
        let column = request.selection.first().and_then(Expression::attribute_id).ok_or_else(|| {
            Error::InvalidArgument("the first trace selection must be an attribute".to_string())
        })?;
        let query = QueryRequest::default()
            .with_filter(filter)
            .with_selection(Expression::aggregate(FunctionType::Count, column));

        let chunks = self.client.execute(AttributeSource::Qs, ctx, query).await?;
        Ok(single_count(&chunks, &request.scope))
    }
}

/// The caller's filter ANDed with the request window on `timestamp`.
fn traces_filter(request: &TracesRequest, timestamp: &str) -> Filter {
    let mut children = vec![time_range_filter(
        timestamp,
        request.start_time_millis,
        request.end_time_millis,
    )];
    children.extend(request.filter.clone());
    Filter::and(children)
}

/// The single cell of a COUNT result. No rows means nothing matched; any
/// other shape is logged and counts as zero.
fn single_count(chunks: &[ResultSetChunk], scope: &str) -> u64 {
    let rows: Vec<_> = chunks.iter().flat_map(|chunk| chunk.rows.iter()).collect();
    if rows.is_empty() {
        return 0;
    }
    if rows.len() != 1 || rows[0].columns.len() != 1 {
        error!(rows = rows.len(), scope, "unexpected shape for trace count result, reporting 0");
        return 0;
    }
    match convert_value(&rows[0].columns[0], ValueType::Long) {
        Ok(Value::Long(count)) => count.max(0) as u64,
        other => {
            error!(value = ?other, scope, "trace count is not a number, reporting 0");
            0
        }
    }
}

fn validate_traces_request(request: &TracesRequest) -> Result<()> {
    if request.scope.trim().is_empty() {
        return Err(Error::InvalidArgument("trace scope is required".to_string()));
    }
    match request.selection.first() {
        None => return Err(Error::InvalidArgument("selection is required".to_string())),
        // The total counts the first selected column.
        Some(first) if first.attribute_id().is_none() => {
            return Err(Error::InvalidArgument(
                "the first trace selection must be an attribute".to_string(),
            ))
        }
        Some(_) => {}
    }
    if request.start_time_millis <= 0 || request.end_time_millis <= request.start_time_millis {
        return Err(Error::InvalidArgument(format!(
            "invalid time range [{}, {})",
            request.start_time_millis, request.end_time_millis
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordedBackend;
    use crate::catalog::InMemoryAttributeCatalog;
    use entigate_proto::{ColumnMetadata, OrderByExpression, ResultSetMetadata, Row};
    use pretty_assertions::assert_eq;

    fn fixture() -> (Arc<RecordedBackend>, TracesService) {
        let backend = Arc::new(RecordedBackend::new());
        let catalog = InMemoryAttributeCatalog::from_attributes(vec![
            AttributeMetadata::new("API_TRACE", "apiTraceId", ValueType::String, vec![AttributeSource::Qs]),
            AttributeMetadata::new("API_TRACE", "startTime", ValueType::Timestamp, vec![AttributeSource::Qs]),
            AttributeMetadata::new("API_TRACE", "duration", ValueType::Long, vec![AttributeSource::Qs]),
            AttributeMetadata::new("API_TRACE", "serviceName", ValueType::String, vec![AttributeSource::Qs]),
        ])
        .unwrap();
        let service = TracesService::new(BackendClient::new(backend.clone()), Arc::new(catalog));
        (backend, service)
    }

    fn chunk(columns: &[&str], rows: Vec<Vec<&str>>) -> ResultSetChunk {
        let metadata = ResultSetMetadata::new(
            columns
                .iter()
                .map(|c| ColumnMetadata::new(*c, ValueType::String))
                .collect(),
        );
        let rows = rows
            .into_iter()
            .map(|row| Row::new(row.into_iter().map(Value::from).collect()))
            .collect();
        ResultSetChunk::new(0, metadata, rows).last()
    }

    fn request() -> TracesRequest {
        TracesRequest::new("API_TRACE", 1_000, 2_000)
            .with_selection(Expression::attribute("API_TRACE.apiTraceId"))
            .with_selection(Expression::attribute("API_TRACE.duration"))
            .with_filter(Filter::eq("API_TRACE.serviceName", "checkout"))
            .with_order_by(OrderByExpression::desc(Expression::attribute("API_TRACE.duration")))
            .with_limit(2)
            .with_offset(4)
    }

    #[tokio::test]
    async fn test_get_traces_pages_and_counts() {
        let (backend, service) = fixture();
        backend.push_chunks(
            AttributeSource::Qs,
            vec![chunk(
                &["API_TRACE.apiTraceId", "API_TRACE.duration"],
                vec![vec!["t1", "30"], vec!["t2", "12"]],
            )],
        );
        backend.push_chunks(AttributeSource::Qs, vec![chunk(&["COUNT_API_TRACE.apiTraceId"], vec![vec!["9"]])]);

        let response = service
            .get_traces(&RequestContext::new("t"), &request())
            .await
            .unwrap();

        assert_eq!(response.total, 9);
        assert_eq!(response.traces.len(), 2);
        assert_eq!(response.traces[0].attributes["API_TRACE.apiTraceId"], Value::from("t1"));
        assert_eq!(response.traces[0].attributes["API_TRACE.duration"], Value::Long(30));

        let expected_filter = Filter::and(vec![
            time_range_filter("API_TRACE.startTime", 1_000, 2_000),
            Filter::eq("API_TRACE.serviceName", "checkout"),
        ]);
        let sent = backend.requests_for(AttributeSource::Qs);
        assert_eq!(sent.len(), 2);
        let listing = &sent[0];
        assert_eq!(listing.filter.as_ref(), Some(&expected_filter));
        assert_eq!(listing.limit, 2);
        assert_eq!(listing.offset, 4);
        assert_eq!(
            listing.order_by,
            vec![OrderByExpression::desc(Expression::attribute("API_TRACE.duration"))]
        );
        let count = &sent[1];
        assert_eq!(count.filter.as_ref(), Some(&expected_filter));
        assert_eq!(
            count.selection[0],
            Expression::aggregate(FunctionType::Count, "API_TRACE.apiTraceId")
        );
        assert!(count.order_by.is_empty());
        assert_eq!(count.limit, 0);
    }

    #[tokio::test]
    async fn test_empty_count_result_is_zero() {
        let (_, service) = fixture();
        let response = service
            .get_traces(&RequestContext::new("t"), &request())
            .await
            .unwrap();
        assert!(response.traces.is_empty());
        assert_eq!(response.total, 0);
    }

    #[tokio::test]
    async fn test_rejects_invalid_requests() {
        let (backend, service) = fixture();
        let ctx = RequestContext::new("t");

        let no_selection = TracesRequest::new("API_TRACE", 1_000, 2_000);
        assert!(matches!(
            service.get_traces(&ctx, &no_selection).await,
            Err(Error::InvalidArgument(_))
        ));

        let bad_window = TracesRequest {
            start_time_millis: 2_000,
            end_time_millis: 1_000,
            ..request()
        };
        assert!(matches!(
            service.get_traces(&ctx, &bad_window).await,
            Err(Error::InvalidArgument(_))
        ));

        let unknown = TracesRequest::new("API_TRACE", 1_000, 2_000)
            .with_selection(Expression::attribute("API_TRACE.nope"));
        assert!(matches!(
            service.get_traces(&ctx, &unknown).await,
            Err(Error::AttributeNotFound(_))
        ));

        let function_first = TracesRequest::new("API_TRACE", 1_000, 2_000)
            .with_selection(Expression::aggregate(FunctionType::Max, "API_TRACE.duration"));
        assert!(matches!(
            service.get_traces(&ctx, &function_first).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(backend.requests().is_empty());
    }
}
