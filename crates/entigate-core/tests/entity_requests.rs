//! End-to-end entity requests against scripted backends.

use std::sync::Arc;

use entigate_core::fetch::{FROM_ENTITY_ID_ATTRIBUTE_ID, TO_ENTITY_ID_ATTRIBUTE_ID, TO_ENTITY_TYPE_ATTRIBUTE_ID};
use entigate_core::{
    AttributeMetadata, BackendClient, EntityQueryExecutor, EntityTypeConfig, EntityTypeConfigs, Error,
    InMemoryAttributeCatalog, InteractionConfig, RecordedBackend, RequestContext, INTERACTION_SCOPE,
};
use entigate_proto::AttributeSource::{Eds, Qs};
use entigate_proto::{
    ColumnMetadata, EntitiesRequest, Expression, Filter, FunctionType, InteractionsRequest, Interval,
    Period, ResultSetChunk, ResultSetMetadata, Row, TimeAggregation, Value, ValueType,
};
use pretty_assertions::assert_eq;

struct TestContext {
    backend: Arc<RecordedBackend>,
    executor: EntityQueryExecutor,
}

impl TestContext {
    fn new() -> Self {
        let backend = Arc::new(RecordedBackend::new());
        let catalog = InMemoryAttributeCatalog::from_attributes(vec![
            AttributeMetadata::new("SERVICE", "id", ValueType::String, vec![Qs, Eds]),
            AttributeMetadata::new("SERVICE", "name", ValueType::String, vec![Qs, Eds]),
            AttributeMetadata::new("SERVICE", "duration", ValueType::Long, vec![Qs]),
            AttributeMetadata::new("SERVICE", "labels", ValueType::StringArray, vec![Eds]),
            AttributeMetadata::new(INTERACTION_SCOPE, "numCalls", ValueType::Long, vec![Qs]),
        ])
        .unwrap();
        let configs = EntityTypeConfigs::new()
            .with_entity_type(
                "SERVICE",
                EntityTypeConfig::new(vec!["SERVICE.id".into()], "SERVICE.startTime"),
            )
            .with_entity_type(
                "BACKEND",
                EntityTypeConfig::new(vec!["BACKEND.id".into()], "BACKEND.startTime"),
            )
            .with_interaction(
                "SERVICE",
                InteractionConfig::new(
                    vec!["INTERACTION.fromServiceId".into()],
                    vec!["INTERACTION.toServiceId".into()],
                ),
            )
            .with_interaction(
                "BACKEND",
                InteractionConfig::new(vec![], vec!["INTERACTION.toBackendId".into()]),
            );
        let executor = EntityQueryExecutor::new(
            BackendClient::new(backend.clone()),
            Arc::new(catalog),
            Arc::new(configs),
        );
        Self { backend, executor }
    }

    fn respond(&self, source: entigate_proto::AttributeSource, columns: &[&str], rows: Vec<Vec<&str>>) {
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
        self.backend
            .push_chunks(source, vec![ResultSetChunk::new(0, metadata, rows).last()]);
    }
}

fn ctx() -> RequestContext {
    RequestContext::new("tenant-1")
}

#[tokio::test]
async fn test_entities_with_series_and_outgoing_interactions() {
    let t = TestContext::new();
    t.respond(
        Qs,
        &["SERVICE.id", "SERVICE.name", "Count"],
        vec![vec!["s1", "checkout", "4"], vec!["s2", "cart", "2"]],
    );
    t.respond(
        Qs,
        &["SERVICE.id", "bucket", "MAX_SERVICE.duration"],
        vec![
            vec!["s1", "120000", "9"],
            vec!["s1", "60000", "5"],
            vec!["s2", "60000", "3"],
        ],
    );
    t.respond(
        Qs,
        &["INTERACTION.fromServiceId", "INTERACTION.toBackendId", "SUM_INTERACTION.numCalls"],
        vec![vec!["s1", "db-1", "12"]],
    );

    let request = EntitiesRequest::new("SERVICE", 60_000, 180_000)
        .with_selection(Expression::attribute("SERVICE.name"))
        .with_time_aggregation(TimeAggregation::new(
            Period::seconds(60),
            Expression::aggregate(FunctionType::Max, "SERVICE.duration"),
        ))
        .with_outgoing_interactions(InteractionsRequest::new(
            Filter::eq(TO_ENTITY_TYPE_ATTRIBUTE_ID, "BACKEND"),
            vec![
                Expression::attribute(TO_ENTITY_ID_ATTRIBUTE_ID),
                Expression::aggregate(FunctionType::Sum, "INTERACTION.numCalls"),
            ],
        ));
    let response = t.executor.execute(&ctx(), request).await.unwrap();

    assert_eq!(t.backend.requests_for(Qs).len(), 3);
    assert!(t.backend.requests_for(Eds).is_empty());
    assert_eq!(response.total, 2);

    let s1 = &response.entities[0];
    assert_eq!(s1.attributes["SERVICE.name"], Value::from("checkout"));
    assert!(!s1.attributes.contains_key("Count"));

    let series = &s1.metric_series["MAX_SERVICE.duration"];
    assert_eq!(series.aggregation, "MAX");
    let starts: Vec<i64> = series.values.iter().map(|i: &Interval| i.start_time_millis).collect();
    assert_eq!(starts, vec![60_000, 120_000]);
    assert_eq!(series.values[1].value, Value::Long(9));
    assert_eq!(series.values[1].end_time_millis, 180_000);

    assert_eq!(s1.outgoing_interactions.len(), 1);
    let edge = &s1.outgoing_interactions[0];
    assert_eq!(edge.attributes[TO_ENTITY_ID_ATTRIBUTE_ID], Value::from("db-1"));
    assert!(!edge.attributes.contains_key(FROM_ENTITY_ID_ATTRIBUTE_ID));
    assert_eq!(edge.metrics["SUM_INTERACTION.numCalls"].value, Value::Long(12));

    let s2 = &response.entities[1];
    assert!(s2.outgoing_interactions.is_empty());
    assert_eq!(s2.metric_series["MAX_SERVICE.duration"].values.len(), 1);
}

#[tokio::test]
async fn test_cross_source_merge_by_entity_key() {
    let t = TestContext::new();
    t.respond(
        Eds,
        &["SERVICE.id", "SERVICE.labels"],
        vec![vec!["s1", r#"["prod"]"#], vec!["s2", r#"["dev"]"#]],
    );
    t.respond(
        Qs,
        &["SERVICE.id", "AVG_SERVICE.duration"],
        vec![vec!["s2", "2.5"], vec!["s1", "7.0"]],
    );

    let request = EntitiesRequest::new("SERVICE", 60_000, 180_000)
        .with_selection(Expression::attribute("SERVICE.id"))
        .with_selection(Expression::attribute("SERVICE.labels"))
        .with_selection(Expression::aggregate(FunctionType::Avg, "SERVICE.duration"));
    let response = t.executor.execute(&ctx(), request).await.unwrap();

    assert_eq!(response.total, 2);
    let by_id = |id: &str| {
        response
            .entities
            .iter()
            .find(|e| e.attributes["SERVICE.id"] == Value::from(id))
            .unwrap()
    };
    assert_eq!(by_id("s1").attributes["SERVICE.labels"], Value::StringArray(vec!["prod".into()]));
    assert_eq!(by_id("s1").metrics["AVG_SERVICE.duration"].value, Value::Double(7.0));
    assert_eq!(by_id("s2").metrics["AVG_SERVICE.duration"].value, Value::Double(2.5));
    assert_eq!(t.backend.requests().len(), 2);
}

#[tokio::test]
async fn test_backend_failure_aborts_request() {
    let t = TestContext::new();
    t.backend.push_error(Qs, "analytic store unavailable");

    let request = EntitiesRequest::new("SERVICE", 60_000, 180_000)
        .with_selection(Expression::attribute("SERVICE.duration"));
    let result = t.executor.execute(&ctx(), request).await;

    assert!(matches!(result, Err(Error::Backend(msg)) if msg.contains("unavailable")));
}

#[tokio::test]
async fn test_unknown_entity_type() {
    let t = TestContext::new();
    let request = EntitiesRequest::new("POD", 60_000, 180_000).with_selection(Expression::attribute("POD.id"));
    let result = t.executor.execute(&ctx(), request).await;

    assert!(matches!(result, Err(Error::UnknownEntityType(_))));
    assert!(t.backend.requests().is_empty());
}
