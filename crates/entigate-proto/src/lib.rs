//! Entigate wire types.
//!
//! This crate defines the types exchanged between gateway callers, the
//! routing engine and the backend engines. Everything derives serde
//! `Serialize`/`Deserialize`; remote backends speak length-prefixed JSON.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for attributes, literals and result cells
//! - [`expression`] - Expressions, filters and orderings
//! - [`request`] - Entity and interaction requests
//! - [`entity`] - Assembled entity results
//! - [`trace`] - Trace listings
//! - [`backend`] - The source-scoped query contract and its envelope
//! - [`framing`] - Length-prefix framing
//! - [`error`] - Protocol error types

pub mod backend;
pub mod entity;
pub mod error;
pub mod expression;
pub mod framing;
pub mod request;
pub mod trace;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use backend::{
    AttributeSource, BackendRequest, BackendResponse, ColumnMetadata, QueryRequest,
    ResultSetChunk, ResultSetMetadata, Row,
};
pub use entity::{
    AggregatedMetricValue, EntitiesResponse, Entity, EntityInteraction, Health, Interval,
    MetricSeries,
};
pub use expression::{
    AttributeRef, Expression, Filter, FunctionExpression, FunctionType, LogicalOperator, Operator,
    OrderByExpression, SortOrder,
};
pub use request::{EntitiesRequest, InteractionsRequest, Period, PeriodUnit, TimeAggregation};
pub use trace::{Trace, TracesRequest, TracesResponse};
pub use value::{Value, ValueType};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_json_roundtrip() {
        let request = EntitiesRequest::new("SERVICE", 1_000, 61_000)
            .with_selection(Expression::attribute("SERVICE.name"))
            .with_selection(Expression::aggregate(FunctionType::Avg, "SERVICE.duration").with_alias("avg_dur"))
            .with_time_aggregation(TimeAggregation::new(
                Period::seconds(30),
                Expression::aggregate(FunctionType::Count, "SERVICE.calls"),
            ))
            .with_filter(Filter::and(vec![
                Filter::eq("SERVICE.id", "svc-1"),
                Filter::compare("SERVICE.duration", Operator::Gt, 10i64),
            ]))
            .with_order_by(OrderByExpression::desc(Expression::attribute("SERVICE.name")))
            .with_limit(10);

        let json = serde_json::to_string(&request).unwrap();
        let decoded: EntitiesRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, request);
    }
}
