//! Filters the fetchers add to backend queries.

use entigate_proto::{Expression, Filter, FunctionType, Operator};

use super::convert::NULL_STRING;
use super::key::EntityKey;

/// Column name the analytic store reports for the COUNT placeholder.
pub const COUNT_COLUMN_NAME: &str = "Count";

/// Row limit for grouped analytic queries. The store truncates grouped
/// results to a small default when no limit is given.
pub const DEFAULT_GROUP_BY_LIMIT: u32 = 10_000;

/// `timestamp >= start AND timestamp < end`.
pub fn time_range_filter(timestamp_attribute: &str, start_time_millis: i64, end_time_millis: i64) -> Filter {
    Filter::and(vec![
        Filter::compare(timestamp_attribute, Operator::Ge, start_time_millis),
        Filter::compare(timestamp_attribute, Operator::Lt, end_time_millis),
    ])
}

/// `id != "null"` for every id column.
pub fn non_null_ids_filter(id_columns: &[String]) -> Filter {
    Filter::and(
        id_columns
            .iter()
            .map(|column| Filter::neq(column.as_str(), NULL_STRING))
            .collect(),
    )
}

/// OR over the keys of AND-of-EQ over the id columns.
pub fn entity_keys_filter<'a>(id_columns: &[String], keys: impl IntoIterator<Item = &'a EntityKey>) -> Filter {
    Filter::or(
        keys.into_iter()
            .map(|key| {
                Filter::and(
                    id_columns
                        .iter()
                        .zip(key.parts())
                        .map(|(column, value)| Filter::eq(column.as_str(), value.as_str()))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// Filter for an analytic entity query: the time window, the caller's filter
/// and the non-null id guard, ANDed.
pub fn analytic_query_filter(
    filter: Option<&Filter>,
    timestamp_attribute: &str,
    start_time_millis: i64,
    end_time_millis: i64,
    id_columns: &[String],
) -> Filter {
    let mut children = vec![time_range_filter(
        timestamp_attribute,
        start_time_millis,
        end_time_millis,
    )];
    children.extend(filter.cloned());
    children.push(non_null_ids_filter(id_columns));
    Filter::and(children)
}

/// The COUNT placeholder the analytic store needs in grouped queries.
pub fn count_placeholder(id_column: &str) -> Expression {
    Expression::aggregate(FunctionType::Count, id_column).with_alias(COUNT_COLUMN_NAME)
}

/// `dateTimeConvert(timestamp, epoch millis, epoch millis, <period>:SECONDS)`.
pub fn time_bucket_expression(timestamp_attribute: &str, period_secs: i64) -> Expression {
    Expression::function(
        FunctionType::DateTimeConvert,
        vec![
            Expression::attribute(timestamp_attribute),
            Expression::literal("1:MILLISECONDS:EPOCH"),
            Expression::literal("1:MILLISECONDS:EPOCH"),
            Expression::literal(format!("{}:SECONDS", period_secs)),
        ],
    )
}

/// Floor `millis` to a multiple of `period_millis`.
pub fn align_down(millis: i64, period_millis: i64) -> i64 {
    millis - millis.rem_euclid(period_millis)
}

/// Ceil `millis` to a multiple of `period_millis`.
pub fn align_up(millis: i64, period_millis: i64) -> i64 {
    match millis.rem_euclid(period_millis) {
        0 => millis,
        rem => millis - rem + period_millis,
    }
}
