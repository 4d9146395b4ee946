//! In-memory attribute catalog.

use std::collections::HashMap;

use dashmap::DashMap;
use tracing::debug;

use super::{AttributeCatalog, AttributeMetadata};
use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Attribute catalog held in memory, typically loaded from the gateway
/// configuration file at startup.
///
/// Metadata is shared by all tenants.
#[derive(Debug, Default)]
pub struct InMemoryAttributeCatalog {
    scopes: DashMap<String, HashMap<String, AttributeMetadata>>,
}

impl InMemoryAttributeCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a list of attributes.
    pub fn from_attributes(attributes: impl IntoIterator<Item = AttributeMetadata>) -> Result<Self> {
        let catalog = Self::new();
        for attribute in attributes {
            catalog.register(attribute)?;
        }
        Ok(catalog)
    }

    /// Register or replace an attribute.
    ///
    /// Attributes without any source are rejected.
    pub fn register(&self, attribute: AttributeMetadata) -> Result<()> {
        if attribute.sources.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "attribute {} has no sources",
                attribute.id
            )));
        }
        debug!(attribute = %attribute.id, sources = ?attribute.sources, "registering attribute");
        self.scopes
            .entry(attribute.scope.clone())
            .or_default()
            .insert(attribute.id.clone(), attribute);
        Ok(())
    }

    /// Number of registered attributes across all scopes.
    pub fn len(&self) -> usize {
        self.scopes.iter().map(|scope| scope.value().len()).sum()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttributeCatalog for InMemoryAttributeCatalog {
    fn attributes(
        &self,
        _ctx: &RequestContext,
        scope: &str,
    ) -> Result<HashMap<String, AttributeMetadata>> {
        Ok(self
            .scopes
            .get(scope)
            .map(|attributes| attributes.value().clone())
            .unwrap_or_default())
    }
}
