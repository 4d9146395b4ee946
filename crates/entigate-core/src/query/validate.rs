//! Request validation and normalization.

use entigate_proto::{EntitiesRequest, Expression};

use crate::error::{Error, Result};

/// Reject requests that cannot be planned.
pub fn validate_request(request: &EntitiesRequest) -> Result<()> {
    validate_count_request(request)?;
    if request.selection.is_empty() && request.time_aggregation.is_empty() {
        return Err(Error::InvalidArgument(
            "selection or time aggregation is required".to_string(),
        ));
    }
    for aggregation in &request.time_aggregation {
        if !aggregation.aggregation.is_function() {
            return Err(Error::InvalidArgument(format!(
                "time aggregation must be a function: {:?}",
                aggregation.aggregation
            )));
        }
        if aggregation.period.as_secs() <= 0 {
            return Err(Error::InvalidArgument(format!(
                "time aggregation period must be positive: {:?}",
                aggregation.period
            )));
        }
    }
    Ok(())
}

/// Entity type and time window checks. Counting needs no selection.
pub fn validate_count_request(request: &EntitiesRequest) -> Result<()> {
    if request.entity_type.trim().is_empty() {
        return Err(Error::InvalidArgument("entity type is required".to_string()));
    }
    if request.start_time_millis <= 0 || request.end_time_millis <= request.start_time_millis {
        return Err(Error::InvalidArgument(format!(
            "invalid time range [{}, {})",
            request.start_time_millis, request.end_time_millis
        )));
    }
    Ok(())
}

/// Give every unaliased function expression its default alias, so result
/// columns can always be matched back by name.
pub fn with_default_aliases(mut request: EntitiesRequest) -> EntitiesRequest {
    request.selection.iter_mut().for_each(alias_function);
    request
        .time_aggregation
        .iter_mut()
        .for_each(|t| alias_function(&mut t.aggregation));
    for interactions in [&mut request.incoming_interactions, &mut request.outgoing_interactions]
        .into_iter()
        .flatten()
    {
        interactions.selection.iter_mut().for_each(alias_function);
    }
    request
}

fn alias_function(expression: &mut Expression) {
    if let Expression::Function(function) = expression {
        if function.alias.is_none() {
            function.alias = Some(function.result_name());
        }
    }
}
