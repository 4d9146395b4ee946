//! Entity result types returned by the gateway.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::request::Period;
use crate::value::Value;

/// Health score attached to a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    #[default]
    NotComputed,
    Green,
    Yellow,
    Red,
}

/// One aggregated metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetricValue {
    /// Aggregation function name, e.g. `AVG`.
    pub function: String,
    pub value: Value,
    #[serde(default)]
    pub health: Health,
}

impl AggregatedMetricValue {
    pub fn new(function: impl Into<String>, value: Value) -> Self {
        Self {
            function: function.into(),
            value,
            health: Health::NotComputed,
        }
    }

    pub fn with_health(mut self, health: Health) -> Self {
        self.health = health;
        self
    }
}

/// A metric value for one half-open time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start_time_millis: i64,
    pub end_time_millis: i64,
    pub value: Value,
    #[serde(default)]
    pub health: Health,
}

/// A time-bucketed metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// Aggregation function name.
    pub aggregation: String,
    pub period: Period,
    pub values: Vec<Interval>,
}

impl MetricSeries {
    pub fn new(aggregation: impl Into<String>, period: Period) -> Self {
        Self {
            aggregation: aggregation.into(),
            period,
            values: vec![],
        }
    }

    /// Order intervals by start time. Stable, so equal starts keep backend order.
    pub fn sort_by_start(&mut self) {
        self.values.sort_by_key(|interval| interval.start_time_millis);
    }
}

/// One interaction edge between this entity and another.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityInteraction {
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub metrics: BTreeMap<String, AggregatedMetricValue>,
}

/// An entity assembled from one or more backend sources.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub metrics: BTreeMap<String, AggregatedMetricValue>,
    #[serde(default)]
    pub metric_series: BTreeMap<String, MetricSeries>,
    #[serde(default)]
    pub incoming_interactions: Vec<EntityInteraction>,
    #[serde(default)]
    pub outgoing_interactions: Vec<EntityInteraction>,
}

impl Entity {
    /// Create an empty entity of the given type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            ..Default::default()
        }
    }

    /// Fold `other` into this entity.
    ///
    /// Attributes, metrics and series from `other` overwrite same-named
    /// entries. Interactions are appended unless an identical edge is already
    /// present, so merging an entity with itself is a no-op.
    pub fn merge(&mut self, other: Entity) {
        if self.entity_type.is_empty() {
            self.entity_type = other.entity_type;
        }
        self.attributes.extend(other.attributes);
        self.metrics.extend(other.metrics);
        self.metric_series.extend(other.metric_series);
        merge_interactions(&mut self.incoming_interactions, other.incoming_interactions);
        merge_interactions(&mut self.outgoing_interactions, other.outgoing_interactions);
    }
}

fn merge_interactions(existing: &mut Vec<EntityInteraction>, incoming: Vec<EntityInteraction>) {
    for interaction in incoming {
        if !existing.contains(&interaction) {
            existing.push(interaction);
        }
    }
}

/// Response to an [`EntitiesRequest`](crate::EntitiesRequest).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntitiesResponse {
    pub entities: Vec<Entity>,
    /// Number of matching entities before pagination.
    pub total: u64,
}
