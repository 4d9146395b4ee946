//! Query planning and execution for entigate.
//!
//! This module routes an entities request across backend sources and merges
//! the partial results into one entity list.

mod context;
mod executor;
mod selector;
mod sort;
mod validate;

pub use context::{ExecutionContext, SourceSet};
pub use executor::EntityQueryExecutor;
pub use selector::{
    has_entity_id_equals_filter, single_source_for_all_attributes, source_sets_for_filter_and_order_by,
    sources_for_filter,
};
pub use sort::{paginate, sort_entities};
pub use validate::{validate_count_request, validate_request, with_default_aliases};
