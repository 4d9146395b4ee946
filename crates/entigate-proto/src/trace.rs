//! Trace request and result types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expression::{Expression, Filter, OrderByExpression};
use crate::value::Value;

/// A filtered listing of traces of one scope over a half-open time window.
///
/// A trace carries the attributes of its root span, so the filter,
/// selection and ordering all name attributes of `scope`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracesRequest {
    /// Attribute scope of the traces, e.g. `API_TRACE`.
    pub scope: String,
    pub start_time_millis: i64,
    pub end_time_millis: i64,
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub selection: Vec<Expression>,
    #[serde(default)]
    pub order_by: Vec<OrderByExpression>,
    /// Zero leaves the limit to the store.
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl TracesRequest {
    pub fn new(scope: impl Into<String>, start_time_millis: i64, end_time_millis: i64) -> Self {
        Self {
            scope: scope.into(),
            start_time_millis,
            end_time_millis,
            filter: None,
            selection: vec![],
            order_by: vec![],
            limit: 0,
            offset: 0,
        }
    }

    pub fn with_selection(mut self, expression: Expression) -> Self {
        self.selection.push(expression);
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
}

/// One trace, keyed by result column name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trace {
    pub attributes: BTreeMap<String, Value>,
}

/// A page of traces and the number matching the filter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TracesResponse {
    pub traces: Vec<Trace>,
    pub total: u64,
}
