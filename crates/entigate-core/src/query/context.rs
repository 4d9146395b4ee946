//! Per-request planning state.
//!
//! An [`ExecutionContext`] partitions every expression of a request by the
//! backend sources able to serve it. It is owned by one request and narrowed
//! in place as the executor resolves each category.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::warn;

use entigate_proto::{
    AttributeSource, EntitiesRequest, Expression, Filter, FunctionExpression, OrderByExpression,
    Period, TimeAggregation,
};

use crate::catalog::AttributeMetadata;
use crate::error::{Error, Result};

/// An ordered set of sources.
pub type SourceSet = BTreeSet<AttributeSource>;

/// Sources whose part of a category has not been fetched yet.
#[derive(Debug, Clone, Default)]
struct Pending {
    selection: SourceSet,
    metric: SourceSet,
    time_aggregation: SourceSet,
    selection_order_by: SourceSet,
    metric_order_by: SourceSet,
}

/// Result names already handed to a source, so an expression several
/// sources can serve is fetched once.
#[derive(Debug, Clone, Default)]
struct Claimed {
    selections: HashSet<String>,
    metrics: HashSet<String>,
    time_aggregations: HashSet<(Period, String)>,
}

/// Planning state of one entities request.
///
/// An expression is assigned to every source able to serve all of its
/// attributes. Expressions no source can serve are dropped with a warning.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    entity_type: String,
    start_time_millis: i64,
    end_time_millis: i64,
    id_attributes: Vec<String>,
    filter: Option<Filter>,

    selections: BTreeMap<AttributeSource, Vec<Expression>>,
    selection_attributes: BTreeMap<AttributeSource, BTreeSet<String>>,
    metrics: BTreeMap<AttributeSource, Vec<Expression>>,
    time_aggregations: BTreeMap<AttributeSource, Vec<TimeAggregation>>,

    filters: BTreeMap<AttributeSource, Vec<Expression>>,
    filter_attribute_sources: BTreeMap<String, SourceSet>,

    order_by: Vec<OrderByExpression>,
    selection_order_by: BTreeMap<AttributeSource, Vec<OrderByExpression>>,
    metric_order_by: BTreeMap<AttributeSource, Vec<OrderByExpression>>,

    attribute_sources: BTreeMap<String, SourceSet>,
    pending: Pending,
    claimed: Claimed,
}

impl ExecutionContext {
    /// Classify `request` using the entity type's attribute metadata.
    ///
    /// Referencing an attribute missing from `attributes` is an error.
    pub fn new(
        attributes: &HashMap<String, AttributeMetadata>,
        id_attributes: &[String],
        request: &EntitiesRequest,
    ) -> Result<Self> {
        let mut classifier = Classifier {
            attributes,
            attribute_sources: BTreeMap::new(),
        };

        let plain: Vec<Expression> = request
            .selection
            .iter()
            .filter(|e| e.attribute_id().is_some())
            .cloned()
            .collect();
        let functions: Vec<Expression> = request
            .selection
            .iter()
            .filter(|e| e.is_function())
            .cloned()
            .collect();

        let selections = classifier.classify(&plain, |e| e)?;
        let metrics = classifier.classify(&functions, |e| e)?;
        let time_aggregations = classifier.classify(&request.time_aggregation, |t| &t.aggregation)?;

        let filter_expressions: Vec<Expression> = request
            .filter
            .as_ref()
            .map(|f| f.lhs_expressions().into_iter().cloned().collect())
            .unwrap_or_default();
        let filters = classifier.classify(&filter_expressions, |e| e)?;

        let order_by = match_order_by_aliases(&request.order_by, &request.selection, &request.time_aggregation);
        let (metric_order_by, selection_order_by): (Vec<_>, Vec<_>) =
            order_by.iter().cloned().partition(|o| o.expression.is_function());
        let selection_order_by = classifier.classify(&selection_order_by, |o| &o.expression)?;
        let metric_order_by = classifier.classify(&metric_order_by, |o| &o.expression)?;

        let pending = Pending {
            selection: selections.keys().copied().collect(),
            metric: metrics.keys().copied().collect(),
            time_aggregation: time_aggregations.keys().copied().collect(),
            selection_order_by: selection_order_by.keys().copied().collect(),
            metric_order_by: metric_order_by.keys().copied().collect(),
        };

        Ok(Self {
            entity_type: request.entity_type.clone(),
            start_time_millis: request.start_time_millis,
            end_time_millis: request.end_time_millis,
            id_attributes: id_attributes.to_vec(),
            filter: request.filter.clone(),
            selection_attributes: attributes_by_source(&selections),
            selections,
            metrics,
            time_aggregations,
            filter_attribute_sources: sources_by_attribute(&filters),
            filters,
            order_by,
            selection_order_by,
            metric_order_by,
            attribute_sources: classifier.attribute_sources,
            pending,
            claimed: Claimed::default(),
        })
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Ordered identity attribute ids of the entity type.
    pub fn id_attributes(&self) -> &[String] {
        &self.id_attributes
    }

    /// The request filter as received.
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn selections(&self) -> &BTreeMap<AttributeSource, Vec<Expression>> {
        &self.selections
    }

    pub fn selection_attributes(&self) -> &BTreeMap<AttributeSource, BTreeSet<String>> {
        &self.selection_attributes
    }

    pub fn metrics(&self) -> &BTreeMap<AttributeSource, Vec<Expression>> {
        &self.metrics
    }

    pub fn time_aggregations(&self) -> &BTreeMap<AttributeSource, Vec<TimeAggregation>> {
        &self.time_aggregations
    }

    /// Filter left-hand expressions by source.
    pub fn filters(&self) -> &BTreeMap<AttributeSource, Vec<Expression>> {
        &self.filters
    }

    /// Reverse of [`filters`](Self::filters): filter attribute to sources.
    pub fn filter_attribute_sources(&self) -> &BTreeMap<String, SourceSet> {
        &self.filter_attribute_sources
    }

    /// The request's order-by with function expressions aliased to the
    /// selection or time aggregation computing them.
    pub fn order_by(&self) -> &[OrderByExpression] {
        &self.order_by
    }

    pub fn selection_order_by(&self) -> &BTreeMap<AttributeSource, Vec<OrderByExpression>> {
        &self.selection_order_by
    }

    pub fn metric_order_by(&self) -> &BTreeMap<AttributeSource, Vec<OrderByExpression>> {
        &self.metric_order_by
    }

    /// Capable sources of every attribute referenced anywhere in the request.
    pub fn attribute_sources(&self) -> &BTreeMap<String, SourceSet> {
        &self.attribute_sources
    }

    pub fn pending_selection_sources(&self) -> &SourceSet {
        &self.pending.selection
    }

    pub fn pending_metric_sources(&self) -> &SourceSet {
        &self.pending.metric
    }

    pub fn pending_time_aggregation_sources(&self) -> &SourceSet {
        &self.pending.time_aggregation
    }

    pub fn pending_selection_order_by_sources(&self) -> &SourceSet {
        &self.pending.selection_order_by
    }

    pub fn pending_metric_order_by_sources(&self) -> &SourceSet {
        &self.pending.metric_order_by
    }

    /// Union of every pending set.
    pub fn pending_sources(&self) -> SourceSet {
        self.pending
            .selection
            .iter()
            .chain(&self.pending.metric)
            .chain(&self.pending.time_aggregation)
            .chain(&self.pending.selection_order_by)
            .chain(&self.pending.metric_order_by)
            .copied()
            .collect()
    }

    /// Whether every category has been fetched.
    pub fn is_complete(&self) -> bool {
        self.pending_sources().is_empty()
    }

    pub fn remove_pending_selection_source(&mut self, source: AttributeSource) {
        self.pending.selection.remove(&source);
    }

    pub fn remove_pending_metric_source(&mut self, source: AttributeSource) {
        self.pending.metric.remove(&source);
    }

    pub fn remove_pending_time_aggregation_source(&mut self, source: AttributeSource) {
        self.pending.time_aggregation.remove(&source);
    }

    pub fn remove_pending_selection_order_by_source(&mut self, source: AttributeSource) {
        self.pending.selection_order_by.remove(&source);
    }

    pub fn remove_pending_metric_order_by_source(&mut self, source: AttributeSource) {
        self.pending.metric_order_by.remove(&source);
    }

    /// Drop `source`'s plain selections that reference any of `attributes`.
    ///
    /// A source left with no selections is no longer pending for selections.
    pub fn remove_selection_attributes(&mut self, source: AttributeSource, attributes: &[String]) {
        let Some(expressions) = self.selections.get_mut(&source) else {
            return;
        };
        expressions.retain(|e| !e.attribute_ids().iter().any(|id| attributes.contains(id)));
        if expressions.is_empty() {
            self.selections.remove(&source);
            self.pending.selection.remove(&source);
        }
        self.selection_attributes = attributes_by_source(&self.selections);
    }

    /// Build the request `source` should serve and mark its categories as
    /// resolved.
    ///
    /// The request carries the source's selections, metrics and time
    /// aggregations not already claimed by another source, plus any order-by
    /// expressions needed to sort in memory. Ordering and pagination are not
    /// pushed down.
    pub fn claim_source_request(&mut self, source: AttributeSource, filter: Option<Filter>) -> EntitiesRequest {
        let mut request = EntitiesRequest::new(self.entity_type.clone(), self.start_time_millis, self.end_time_millis);
        request.filter = filter;

        let selections = self.selections.get(&source).into_iter().flatten();
        let selection_order_by = self
            .selection_order_by
            .get(&source)
            .into_iter()
            .flatten()
            .map(|o| &o.expression);
        for expression in selections.chain(selection_order_by) {
            if self.claimed.selections.insert(expression.result_name()) {
                request.selection.push(expression.clone());
            }
        }

        let metrics = self.metrics.get(&source).into_iter().flatten();
        let metric_order_by = self
            .metric_order_by
            .get(&source)
            .into_iter()
            .flatten()
            .map(|o| &o.expression);
        for expression in metrics.chain(metric_order_by) {
            if self.claimed.metrics.insert(expression.result_name()) {
                request.selection.push(expression.clone());
            }
        }

        for aggregation in self.time_aggregations.get(&source).into_iter().flatten() {
            let key = (aggregation.period, aggregation.aggregation.result_name());
            if self.claimed.time_aggregations.insert(key) {
                request.time_aggregation.push(aggregation.clone());
            }
        }

        self.remove_pending_selection_source(source);
        self.remove_pending_metric_source(source);
        self.remove_pending_time_aggregation_source(source);
        self.remove_pending_selection_order_by_source(source);
        self.remove_pending_metric_order_by_source(source);
        request
    }
}

struct Classifier<'a> {
    attributes: &'a HashMap<String, AttributeMetadata>,
    attribute_sources: BTreeMap<String, SourceSet>,
}

impl Classifier<'_> {
    /// Sources able to serve every attribute of `expression`.
    fn sources_for(&mut self, expression: &Expression) -> Result<SourceSet> {
        let mut sources: SourceSet = AttributeSource::ALL.into_iter().collect();
        for attribute_id in expression.attribute_ids() {
            let metadata = self
                .attributes
                .get(&attribute_id)
                .ok_or_else(|| Error::AttributeNotFound(attribute_id.clone()))?;
            sources.retain(|s| metadata.served_by(*s));
            self.attribute_sources
                .entry(attribute_id)
                .or_default()
                .extend(metadata.sources.iter().copied());
        }
        Ok(sources)
    }

    fn classify<T: Clone>(
        &mut self,
        items: &[T],
        expression_of: impl Fn(&T) -> &Expression,
    ) -> Result<BTreeMap<AttributeSource, Vec<T>>> {
        let mut by_source: BTreeMap<AttributeSource, Vec<T>> = BTreeMap::new();
        for item in items {
            let expression = expression_of(item);
            let sources = self.sources_for(expression)?;
            if sources.is_empty() {
                warn!(?expression, "no source can serve expression, dropping it");
                continue;
            }
            for source in sources {
                by_source.entry(source).or_default().push(item.clone());
            }
        }
        Ok(by_source)
    }
}

fn attributes_by_source(map: &BTreeMap<AttributeSource, Vec<Expression>>) -> BTreeMap<AttributeSource, BTreeSet<String>> {
    map.iter()
        .map(|(source, expressions)| {
            (
                *source,
                expressions.iter().flat_map(Expression::attribute_ids).collect(),
            )
        })
        .collect()
}

/// Attribute to the sources it was assigned to in `map`.
pub(crate) fn sources_by_attribute(map: &BTreeMap<AttributeSource, Vec<Expression>>) -> BTreeMap<String, SourceSet> {
    let mut out: BTreeMap<String, SourceSet> = BTreeMap::new();
    for (source, expressions) in map {
        for attribute_id in expressions.iter().flat_map(Expression::attribute_ids) {
            out.entry(attribute_id).or_default().insert(*source);
        }
    }
    out
}

/// Give function order-bys the alias of the selection or time aggregation
/// computing the same function, so sorting finds the result column.
fn match_order_by_aliases(
    order_by: &[OrderByExpression],
    selection: &[Expression],
    time_aggregation: &[TimeAggregation],
) -> Vec<OrderByExpression> {
    let declared: Vec<&FunctionExpression> = selection
        .iter()
        .filter_map(Expression::as_function)
        .chain(time_aggregation.iter().filter_map(|t| t.aggregation.as_function()))
        .collect();

    order_by
        .iter()
        .map(|o| match o.expression.as_function() {
            Some(function) => {
                let alias = declared
                    .iter()
                    .find(|d| d.function == function.function && d.arguments == function.arguments)
                    .map(|d| d.result_name())
                    .unwrap_or_else(|| function.result_name());
                OrderByExpression {
                    expression: Expression::Function(FunctionExpression {
                        alias: Some(alias),
                        ..function.clone()
                    }),
                    order: o.order,
                }
            }
            None => o.clone(),
        })
        .collect()
}
