//! Attribute metadata.

use entigate_proto::{AttributeSource, ValueType};
use serde::{Deserialize, Serialize};

/// Metadata for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    /// Fully qualified id, e.g. `API.name`.
    pub id: String,
    /// Owning scope, usually an entity type.
    pub scope: String,
    /// Short key within the scope, e.g. `name`.
    pub key: String,
    /// Declared value kind.
    pub value_kind: ValueType,
    /// Sources able to serve this attribute. Never empty.
    pub sources: Vec<AttributeSource>,
}

impl AttributeMetadata {
    /// Create metadata for `scope.key`.
    pub fn new(
        scope: impl Into<String>,
        key: impl Into<String>,
        value_kind: ValueType,
        sources: Vec<AttributeSource>,
    ) -> Self {
        let scope = scope.into();
        let key = key.into();
        Self {
            id: format!("{}.{}", scope, key),
            scope,
            key,
            value_kind,
            sources,
        }
    }

    /// Whether `source` can serve this attribute.
    pub fn served_by(&self, source: AttributeSource) -> bool {
        self.sources.contains(&source)
    }

    /// Whether the declared kind is DOUBLE or LONG.
    pub fn is_numeric(&self) -> bool {
        matches!(self.value_kind, ValueType::Double | ValueType::Long)
    }
}
