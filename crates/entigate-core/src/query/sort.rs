//! In-memory ordering and pagination of merged entities.

use std::cmp::Ordering;

use entigate_proto::{Entity, OrderByExpression, SortOrder, Value};
use tracing::warn;

/// Sort entities by the order-by expressions.
///
/// Each expression is looked up by result name among the attributes, then
/// among the metrics. Missing values sort first in ascending order. The sort
/// is stable, so ties keep fetch order. A name found on no entity, such as a
/// time-series alias, orders nothing and is reported with a warning.
pub fn sort_entities(entities: &mut [Entity], order_by: &[OrderByExpression]) {
    if order_by.is_empty() {
        return;
    }
    let names: Vec<(String, SortOrder)> = order_by
        .iter()
        .map(|o| (o.expression.result_name(), o.order))
        .collect();

    for (name, _) in &names {
        if entities.is_empty() || entities.iter().any(|e| sort_value(e, name).is_some()) {
            continue;
        }
        if entities.iter().any(|e| e.metric_series.contains_key(name)) {
            warn!(order_by = %name, "cannot order by a metric series, ignoring");
        } else {
            warn!(order_by = %name, "order-by matches no attribute or metric, ignoring");
        }
    }

    entities.sort_by(|a, b| {
        for (name, order) in &names {
            let cmp = compare_values_opt(sort_value(a, name), sort_value(b, name));
            let cmp = match order {
                SortOrder::Asc => cmp,
                SortOrder::Desc => cmp.reverse(),
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
}

/// Drop the first `offset` entities and keep at most `limit`. Zero means
/// unlimited.
pub fn paginate(entities: &mut Vec<Entity>, limit: u32, offset: u32) {
    let offset = offset as usize;
    if offset > 0 {
        if offset >= entities.len() {
            entities.clear();
            return;
        }
        entities.drain(0..offset);
    }
    if limit > 0 && (limit as usize) < entities.len() {
        entities.truncate(limit as usize);
    }
}

fn sort_value<'a>(entity: &'a Entity, name: &str) -> Option<&'a Value> {
    entity
        .attributes
        .get(name)
        .or_else(|| entity.metrics.get(name).map(|m| &m.value))
}

fn compare_values_opt(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Long(a), Value::Long(b)) | (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        (Value::StringArray(a), Value::StringArray(b)) => a.cmp(b),
        // Mixed numeric kinds compare as doubles
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}
