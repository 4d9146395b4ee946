//! Conversion of backend cells to gateway values.
//!
//! The analytic store reports most cells as strings. Values are converted to
//! the kind the catalog declares for the attribute, or the kind implied by
//! the aggregation producing them.

use std::collections::HashMap;

use entigate_proto::{Expression, FunctionExpression, FunctionType, Health, Value, ValueType};

use crate::catalog::AttributeMetadata;
use crate::error::{Error, Result};

/// String the analytic store uses for null cells.
pub const NULL_STRING: &str = "null";

/// Convert `value` to `kind`.
pub fn convert_value(value: &Value, kind: ValueType) -> Result<Value> {
    if value.is_null() || kind == ValueType::NullString {
        return Ok(Value::Null);
    }
    if let Value::String(s) = value {
        if s == NULL_STRING && kind != ValueType::String {
            return Ok(Value::Null);
        }
    }

    let converted = match (kind, value) {
        (ValueType::String, Value::String(s)) => Some(Value::String(s.clone())),
        (ValueType::String, other) => Some(Value::String(other.to_string())),
        (ValueType::Long, v) => to_i64(v).map(Value::Long),
        (ValueType::Timestamp, v) => to_i64(v).map(Value::Timestamp),
        (ValueType::Double, v) => to_f64(v).map(Value::Double),
        (ValueType::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
        (ValueType::Bool, Value::String(s)) => s.parse().ok().map(Value::Bool),
        (ValueType::StringArray, Value::StringArray(_))
        | (ValueType::LongArray, Value::LongArray(_))
        | (ValueType::DoubleArray, Value::DoubleArray(_))
        | (ValueType::BoolArray, Value::BoolArray(_))
        | (ValueType::StringMap, Value::StringMap(_)) => Some(value.clone()),
        (ValueType::StringArray, Value::String(s)) => serde_json::from_str(s)
            .map(Value::StringArray)
            .ok()
            .or_else(|| Some(Value::StringArray(vec![s.clone()]))),
        (ValueType::LongArray, Value::String(s)) => serde_json::from_str(s).ok().map(Value::LongArray),
        (ValueType::DoubleArray, Value::String(s)) => {
            serde_json::from_str(s).ok().map(Value::DoubleArray)
        }
        (ValueType::BoolArray, Value::String(s)) => serde_json::from_str(s).ok().map(Value::BoolArray),
        (ValueType::StringMap, Value::String(s)) => serde_json::from_str(s).ok().map(Value::StringMap),
        _ => None,
    };

    converted.ok_or_else(|| {
        Error::InvalidArgument(format!("cannot convert {:?} to {:?}", value, kind))
    })
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Long(v) | Value::Timestamp(v) => Some(*v),
        Value::Double(v) => Some(*v as i64),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|v| v as i64)),
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        other => other.as_f64(),
    }
}

/// Convert a plain attribute cell using the attribute's declared kind.
/// Columns with no catalog entry pass through unchanged.
pub fn attribute_value(
    column_name: &str,
    value: &Value,
    attributes: &HashMap<String, AttributeMetadata>,
) -> Result<Value> {
    match attributes.get(column_name) {
        Some(metadata) => convert_value(value, metadata.value_kind),
        None => Ok(value.clone()),
    }
}

/// The value kind produced by an aggregation.
///
/// COUNT and DISTINCTCOUNT yield LONG; MIN, MAX and SUM keep the
/// attribute's kind, which must be numeric; AVG, AVGRATE and PERCENTILE
/// yield DOUBLE; anything else keeps the attribute's kind.
pub fn metric_value_kind(
    function: &FunctionExpression,
    attributes: &HashMap<String, AttributeMetadata>,
) -> Result<ValueType> {
    let attribute_id = function
        .arguments
        .iter()
        .find_map(Expression::attribute_id)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "function {} has no attribute argument",
                function.function.name()
            ))
        })?;
    let metadata = attributes
        .get(attribute_id)
        .ok_or_else(|| Error::AttributeNotFound(attribute_id.to_string()))?;

    match &function.function {
        FunctionType::Count | FunctionType::DistinctCount => Ok(ValueType::Long),
        FunctionType::Min | FunctionType::Max | FunctionType::Sum => {
            if metadata.is_numeric() {
                Ok(metadata.value_kind)
            } else {
                Err(Error::InvalidArgument(format!(
                    "incompatible data type for function {}: attribute {} is {:?}",
                    function.function.name(),
                    attribute_id,
                    metadata.value_kind
                )))
            }
        }
        FunctionType::Avg | FunctionType::AvgRate | FunctionType::Percentile => Ok(ValueType::Double),
        FunctionType::DateTimeConvert | FunctionType::Custom(_) => Ok(metadata.value_kind),
    }
}

/// Health of a metric produced by `function`.
///
/// A function may carry at most one health argument. Health scoring is not
/// wired up, so the result is always `NotComputed`.
pub fn metric_health(function: &FunctionExpression) -> Result<Health> {
    if function.health_argument_count() > 1 {
        return Err(Error::InvalidArgument(format!(
            "function {} has more than one health argument",
            function.result_name()
        )));
    }
    Ok(Health::NotComputed)
}

/// Per-second rate of `raw` over the half-open window `[start, end)`.
///
/// An optional LONG literal argument scales the rate to that many seconds,
/// e.g. `AVGRATE(bytes, 60)` is a per-minute rate.
pub fn avg_rate(
    function: &FunctionExpression,
    raw: &Value,
    start_time_millis: i64,
    end_time_millis: i64,
) -> Result<Value> {
    let window_secs = (end_time_millis - start_time_millis) as f64 / 1000.0;
    if window_secs <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "empty time window [{}, {})",
            start_time_millis, end_time_millis
        )));
    }

    let unit_secs = function
        .arguments
        .iter()
        .filter_map(Expression::as_literal)
        .find_map(Value::as_i64)
        .unwrap_or(1);
    if unit_secs <= 0 {
        return Err(Error::InvalidArgument(format!(
            "rate unit must be positive, got {}",
            unit_secs
        )));
    }

    match convert_value(raw, ValueType::Double)? {
        Value::Double(total) => Ok(Value::Double(total / (window_secs / unit_secs as f64))),
        _ => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigate_proto::AttributeSource;

    fn attributes() -> HashMap<String, AttributeMetadata> {
        [
            AttributeMetadata::new("API", "calls", ValueType::Long, vec![AttributeSource::Qs]),
            AttributeMetadata::new("API", "latency", ValueType::Double, vec![AttributeSource::Qs]),
            AttributeMetadata::new("API", "name", ValueType::String, vec![AttributeSource::Qs]),
        ]
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect()
    }

    fn function(function: FunctionType, attribute: &str) -> FunctionExpression {
        match Expression::aggregate(function, attribute) {
            Expression::Function(f) => f,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_convert_strings() {
        assert_eq!(convert_value(&Value::from("42"), ValueType::Long).unwrap(), Value::Long(42));
        assert_eq!(convert_value(&Value::from("4.0"), ValueType::Long).unwrap(), Value::Long(4));
        assert_eq!(
            convert_value(&Value::from("1.5"), ValueType::Double).unwrap(),
            Value::Double(1.5)
        );
        assert_eq!(convert_value(&Value::from("null"), ValueType::Long).unwrap(), Value::Null);
        assert_eq!(
            convert_value(&Value::from(r#"["a","b"]"#), ValueType::StringArray).unwrap(),
            Value::StringArray(vec!["a".into(), "b".into()])
        );
        assert!(convert_value(&Value::from("abc"), ValueType::Long).is_err());
    }

    #[test]
    fn test_metric_value_kind() {
        let attrs = attributes();
        assert_eq!(
            metric_value_kind(&function(FunctionType::Count, "API.name"), &attrs).unwrap(),
            ValueType::Long
        );
        assert_eq!(
            metric_value_kind(&function(FunctionType::Sum, "API.calls"), &attrs).unwrap(),
            ValueType::Long
        );
        assert_eq!(
            metric_value_kind(&function(FunctionType::Max, "API.latency"), &attrs).unwrap(),
            ValueType::Double
        );
        assert_eq!(
            metric_value_kind(&function(FunctionType::Percentile, "API.calls"), &attrs).unwrap(),
            ValueType::Double
        );
        assert!(matches!(
            metric_value_kind(&function(FunctionType::Sum, "API.name"), &attrs),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_avg_rate() {
        let func = function(FunctionType::AvgRate, "API.calls");
        let rate = avg_rate(&func, &Value::from("120"), 0, 60_000).unwrap();
        assert_eq!(rate, Value::Double(2.0));

        let per_minute = FunctionExpression {
            arguments: vec![Expression::attribute("API.calls"), Expression::literal(60i64)],
            ..func.clone()
        };
        let rate = avg_rate(&per_minute, &Value::Long(120), 0, 120_000).unwrap();
        assert_eq!(rate, Value::Double(60.0));

        assert!(avg_rate(&func, &Value::Long(1), 10, 10).is_err());
    }

    #[test]
    fn test_metric_health() {
        let mut func = function(FunctionType::Avg, "API.latency");
        assert_eq!(metric_health(&func).unwrap(), Health::NotComputed);
        func.arguments.push(Expression::Health);
        func.arguments.push(Expression::Health);
        assert!(metric_health(&func).is_err());
    }
}
