//! Source routing decisions over an [`ExecutionContext`].

use std::collections::{BTreeMap, BTreeSet};

use entigate_proto::{AttributeSource, Expression, Filter, LogicalOperator, Operator};

use super::context::{sources_by_attribute, ExecutionContext, SourceSet};

/// The one source able to answer the whole request, if any.
///
/// First the union of every category's sources is checked. When that holds
/// several sources, the capable sources of every referenced attribute are
/// intersected: attributes served by several sources may still all be
/// served by a single one.
pub fn single_source_for_all_attributes(plan: &ExecutionContext) -> Option<AttributeSource> {
    single_source_from_key_sets(plan).or_else(|| single_source_from_attribute_sources(plan))
}

fn single_source_from_key_sets(plan: &ExecutionContext) -> Option<AttributeSource> {
    let sources: SourceSet = plan
        .selections()
        .keys()
        .chain(plan.metrics().keys())
        .chain(plan.time_aggregations().keys())
        .chain(plan.filters().keys())
        .chain(plan.selection_order_by().keys())
        .chain(plan.metric_order_by().keys())
        .copied()
        .collect();
    only(sources)
}

fn single_source_from_attribute_sources(plan: &ExecutionContext) -> Option<AttributeSource> {
    only(intersect_all(plan.attribute_sources().values()))
}

/// Sources able to serve both the filter and the order-by.
///
/// When only one of the two is present its own common sources are returned.
/// An empty set means filtering and sorting cannot be pushed to one source.
pub fn source_sets_for_filter_and_order_by(plan: &ExecutionContext) -> SourceSet {
    let filter_sources = sources_by_attribute(plan.filters());
    let order_by_sources = sources_by_attribute(&order_by_expressions(plan));

    match (filter_sources.is_empty(), order_by_sources.is_empty()) {
        (true, true) => SourceSet::new(),
        (false, true) => intersect_all(filter_sources.values()),
        (true, false) => intersect_all(order_by_sources.values()),
        (false, false) => intersect_all(filter_sources.values())
            .intersection(&intersect_all(order_by_sources.values()))
            .copied()
            .collect(),
    }
}

/// Sources able to evaluate every filter attribute.
pub fn sources_for_filter(plan: &ExecutionContext) -> SourceSet {
    intersect_all(plan.filter_attribute_sources().values())
}

fn order_by_expressions(plan: &ExecutionContext) -> BTreeMap<AttributeSource, Vec<Expression>> {
    let mut out: BTreeMap<AttributeSource, Vec<Expression>> = BTreeMap::new();
    for (source, order_by) in plan.selection_order_by().iter().chain(plan.metric_order_by()) {
        out.entry(*source)
            .or_default()
            .extend(order_by.iter().map(|o| o.expression.clone()));
    }
    out
}

/// Whether the request filter pins one entity by equality on all of its
/// identity attributes.
///
/// Leans to `false`: any OR or NOT in the tree, an empty AND, or a missing
/// identity part all answer `false`. Identity equalities may appear at any
/// depth of nested ANDs and in any order.
pub fn has_entity_id_equals_filter(plan: &ExecutionContext) -> bool {
    let Some(filter) = plan.filter() else {
        return false;
    };
    let ids = plan.id_attributes();
    if ids.is_empty() {
        return false;
    }
    if ids.len() == 1 && id_equality(filter, ids).is_some() {
        return true;
    }
    if filter.contains_disjunction_or_negation() {
        return false;
    }

    match filter {
        Filter::Composite {
            operator: LogicalOperator::And,
            children,
        } if !children.is_empty() => {
            let mut matched = BTreeSet::new();
            collect_id_equalities(children, ids, &mut matched);
            matched.len() == ids.len()
        }
        _ => false,
    }
}

fn collect_id_equalities<'a>(children: &'a [Filter], ids: &[String], matched: &mut BTreeSet<&'a str>) {
    for child in children {
        match child {
            Filter::Composite {
                operator: LogicalOperator::And,
                children,
            } => collect_id_equalities(children, ids, matched),
            _ => {
                if let Some(id) = id_equality(child, ids) {
                    matched.insert(id);
                }
            }
        }
    }
}

/// The identity attribute `filter` compares for equality with a literal.
fn id_equality<'a>(filter: &'a Filter, ids: &[String]) -> Option<&'a str> {
    match filter {
        Filter::Predicate {
            lhs,
            operator: Operator::Eq,
            rhs,
        } if rhs.as_literal().is_some() => lhs.attribute_id().filter(|id| ids.iter().any(|i| i.as_str() == *id)),
        _ => None,
    }
}

fn intersect_all<'a>(mut sets: impl Iterator<Item = &'a SourceSet>) -> SourceSet {
    let Some(first) = sets.next() else {
        return SourceSet::new();
    };
    sets.fold(first.clone(), |acc, set| acc.intersection(set).copied().collect())
}

fn only(sources: SourceSet) -> Option<AttributeSource> {
    if sources.len() == 1 {
        sources.into_iter().next()
    } else {
        None
    }
}
