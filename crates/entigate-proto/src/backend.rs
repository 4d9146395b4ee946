//! Backend query contract and the envelope used to carry it to remote engines.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expression::{Expression, Filter, OrderByExpression};
use crate::value::{Value, ValueType};

/// A backend capable of serving attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeSource {
    /// Columnar analytic store. Serves time-windowed aggregations.
    #[serde(rename = "QS")]
    Qs,
    /// Entity key-value store. Serves plain entity attributes.
    #[serde(rename = "EDS")]
    Eds,
}

impl AttributeSource {
    /// Every known source.
    pub const ALL: [AttributeSource; 2] = [AttributeSource::Qs, AttributeSource::Eds];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeSource::Qs => "QS",
            AttributeSource::Eds => "EDS",
        }
    }
}

impl fmt::Display for AttributeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source-scoped query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub filter: Option<Filter>,
    #[serde(default)]
    pub selection: Vec<Expression>,
    #[serde(default)]
    pub group_by: Vec<Expression>,
    #[serde(default)]
    pub order_by: Vec<OrderByExpression>,
    /// Zero lets the backend apply its own default.
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl QueryRequest {
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_selection(mut self, expression: Expression) -> Self {
        self.selection.push(expression);
        self
    }

    pub fn with_group_by(mut self, expression: Expression) -> Self {
        self.group_by.push(expression);
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

/// Name and kind of one result column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub column_name: String,
    pub value_type: ValueType,
}

impl ColumnMetadata {
    pub fn new(column_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            column_name: column_name.into(),
            value_type,
        }
    }
}

/// Column layout of a result set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSetMetadata {
    pub column_metadata: Vec<ColumnMetadata>,
}

impl ResultSetMetadata {
    pub fn new(column_metadata: Vec<ColumnMetadata>) -> Self {
        Self { column_metadata }
    }

    pub fn column_count(&self) -> usize {
        self.column_metadata.len()
    }
}

/// One result row, positionally aligned with the metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub columns: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<Value>) -> Self {
        Self { columns }
    }

    pub fn column(&self, index: usize) -> Option<&Value> {
        self.columns.get(index)
    }
}

/// One chunk of a streamed result set. Every non-empty chunk carries the
/// result metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSetChunk {
    pub chunk_id: u32,
    #[serde(default)]
    pub is_last_chunk: bool,
    #[serde(default)]
    pub metadata: Option<ResultSetMetadata>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl ResultSetChunk {
    /// Create a chunk with metadata.
    pub fn new(chunk_id: u32, metadata: ResultSetMetadata, rows: Vec<Row>) -> Self {
        Self {
            chunk_id,
            is_last_chunk: false,
            metadata: Some(metadata),
            rows,
        }
    }

    pub fn last(mut self) -> Self {
        self.is_last_chunk = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Request envelope sent to a remote backend engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRequest {
    pub id: u64,
    pub source: AttributeSource,
    pub tenant_id: String,
    pub query: QueryRequest,
}

impl BackendRequest {
    pub fn new(id: u64, source: AttributeSource, tenant_id: impl Into<String>, query: QueryRequest) -> Self {
        Self {
            id,
            source,
            tenant_id: tenant_id.into(),
            query,
        }
    }
}

/// Response envelope from a remote backend engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackendResponse {
    pub id: u64,
    #[serde(default)]
    pub chunks: Vec<ResultSetChunk>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BackendResponse {
    pub fn ok(id: u64, chunks: Vec<ResultSetChunk>) -> Self {
        Self {
            id,
            chunks,
            error: None,
        }
    }

    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            chunks: vec![],
            error: Some(message.into()),
        }
    }
}
