//! Per-request caller context.

use std::collections::BTreeMap;

/// Tenant and pass-through headers of one caller request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestContext {
    pub tenant_id: String,
    pub headers: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
