//! Gateway-facing request types.

use serde::{Deserialize, Serialize};

use crate::expression::{Expression, Filter, OrderByExpression};

/// Unit of a [`Period`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl PeriodUnit {
    fn seconds(self) -> i64 {
        match self {
            PeriodUnit::Seconds => 1,
            PeriodUnit::Minutes => 60,
            PeriodUnit::Hours => 3600,
            PeriodUnit::Days => 86_400,
        }
    }
}

/// Width of a time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub value: u32,
    pub unit: PeriodUnit,
}

impl Period {
    /// Create a period.
    pub fn new(value: u32, unit: PeriodUnit) -> Self {
        Self { value, unit }
    }

    /// Period of `value` seconds.
    pub fn seconds(value: u32) -> Self {
        Self::new(value, PeriodUnit::Seconds)
    }

    /// Period of `value` minutes.
    pub fn minutes(value: u32) -> Self {
        Self::new(value, PeriodUnit::Minutes)
    }

    /// Width in seconds.
    pub fn as_secs(&self) -> i64 {
        i64::from(self.value) * self.unit.seconds()
    }

    /// Width in milliseconds.
    pub fn as_millis(&self) -> i64 {
        self.as_secs() * 1000
    }
}

/// An aggregation evaluated per time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAggregation {
    pub period: Period,
    /// Must be a function expression.
    pub aggregation: Expression,
}

impl TimeAggregation {
    pub fn new(period: Period, aggregation: Expression) -> Self {
        Self { period, aggregation }
    }
}

/// Projection of interaction edges for each returned entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InteractionsRequest {
    /// Must name the other side's entity type(s) via `fromEntityType` or
    /// `toEntityType`.
    pub filter: Option<Filter>,
    #[serde(default)]
    pub selection: Vec<Expression>,
    /// Zero means the default grouped-query limit.
    #[serde(default)]
    pub limit: u32,
}

impl InteractionsRequest {
    pub fn new(filter: Filter, selection: Vec<Expression>) -> Self {
        Self {
            filter: Some(filter),
            selection,
            limit: 0,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

/// A request for entities of one type over a half-open time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitiesRequest {
    pub entity_type: String,
    pub start_time_millis: i64,
    pub end_time_millis: i64,
    #[serde(default)]
    pub selection: Vec<Expression>,
    #[serde(default)]
    pub time_aggregation: Vec<TimeAggregation>,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub order_by: Vec<OrderByExpression>,
    /// Zero means unlimited.
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub incoming_interactions: Option<InteractionsRequest>,
    #[serde(default)]
    pub outgoing_interactions: Option<InteractionsRequest>,
}

impl EntitiesRequest {
    /// Create a request for `entity_type` over `[start, end)`.
    pub fn new(entity_type: impl Into<String>, start_time_millis: i64, end_time_millis: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            start_time_millis,
            end_time_millis,
            selection: vec![],
            time_aggregation: vec![],
            filter: None,
            order_by: vec![],
            limit: 0,
            offset: 0,
            incoming_interactions: None,
            outgoing_interactions: None,
        }
    }

    pub fn with_selection(mut self, expression: Expression) -> Self {
        self.selection.push(expression);
        self
    }

    pub fn with_time_aggregation(mut self, aggregation: TimeAggregation) -> Self {
        self.time_aggregation.push(aggregation);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order_by(mut self, order_by: OrderByExpression) -> Self {
        self.order_by.push(order_by);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_incoming_interactions(mut self, interactions: InteractionsRequest) -> Self {
        self.incoming_interactions = Some(interactions);
        self
    }

    pub fn with_outgoing_interactions(mut self, interactions: InteractionsRequest) -> Self {
        self.outgoing_interactions = Some(interactions);
        self
    }

    /// Window length in milliseconds.
    pub fn window_millis(&self) -> i64 {
        self.end_time_millis - self.start_time_millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_conversion() {
        assert_eq!(Period::seconds(30).as_secs(), 30);
        assert_eq!(Period::minutes(5).as_millis(), 300_000);
        assert_eq!(Period::new(1, PeriodUnit::Days).as_secs(), 86_400);
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: EntitiesRequest = serde_json::from_value(serde_json::json!({
            "entity_type": "API",
            "start_time_millis": 1000,
            "end_time_millis": 2000,
            "selection": [{"attribute": {"id": "API.name"}}]
        }))
        .unwrap();

        assert_eq!(request.window_millis(), 1000);
        assert_eq!(request.limit, 0);
        assert!(request.filter.is_none());
        assert!(request.order_by.is_empty());
    }
}
