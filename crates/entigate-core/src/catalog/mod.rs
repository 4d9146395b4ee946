//! Attribute catalog for entigate.
//!
//! The catalog maps every attribute id to its value kind and the set of
//! backend sources able to serve it. Routing decisions are made from this
//! metadata.

mod attribute;
mod memory;

pub use attribute::AttributeMetadata;
pub use memory::InMemoryAttributeCatalog;

use std::collections::HashMap;

use crate::context::RequestContext;
use crate::error::{Error, Result};

/// Scope holding interaction attributes.
pub const INTERACTION_SCOPE: &str = "INTERACTION";

/// Lookup of attribute metadata by scope.
///
/// Implementations are shared across in-flight requests and must be safe for
/// concurrent use.
pub trait AttributeCatalog: Send + Sync {
    /// All attributes of `scope`, keyed by attribute id.
    fn attributes(
        &self,
        ctx: &RequestContext,
        scope: &str,
    ) -> Result<HashMap<String, AttributeMetadata>>;

    /// Metadata for one attribute of `scope`.
    fn attribute(&self, ctx: &RequestContext, scope: &str, id: &str) -> Result<AttributeMetadata> {
        self.attributes(ctx, scope)?
            .remove(id)
            .ok_or_else(|| Error::AttributeNotFound(id.to_string()))
    }
}
