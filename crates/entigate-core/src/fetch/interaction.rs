//! Interaction edges between entities.
//!
//! An interaction is a directed edge from a caller entity to a callee entity.
//! Requests name the other end by the logical placeholder attributes
//! [`FROM_ENTITY_TYPE_ATTRIBUTE_ID`], [`TO_ENTITY_TYPE_ATTRIBUTE_ID`],
//! [`FROM_ENTITY_ID_ATTRIBUTE_ID`] and [`TO_ENTITY_ID_ATTRIBUTE_ID`], which
//! are rewritten to the concrete interaction columns of each entity type.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use entigate_proto::{
    AggregatedMetricValue, AttributeSource, EntitiesRequest, EntityInteraction, Expression, Filter,
    FunctionExpression, InteractionsRequest, QueryRequest, Value,
};

use super::convert::{attribute_value, convert_value, metric_value_kind};
use super::filter::{
    count_placeholder, entity_keys_filter, non_null_ids_filter, time_range_filter, COUNT_COLUMN_NAME,
    DEFAULT_GROUP_BY_LIMIT,
};
use super::{aliased, chunk_metadata, EntityFetcherResponse, EntityKey};
use crate::backend::BackendClient;
use crate::catalog::{AttributeCatalog, INTERACTION_SCOPE};
use crate::config::{EntityTypeConfigs, InteractionSide};
use crate::context::RequestContext;
use crate::error::{Error, Result};

pub const FROM_ENTITY_TYPE_ATTRIBUTE_ID: &str = "INTERACTION.fromEntityType";
pub const TO_ENTITY_TYPE_ATTRIBUTE_ID: &str = "INTERACTION.toEntityType";
pub const FROM_ENTITY_ID_ATTRIBUTE_ID: &str = "INTERACTION.fromEntityId";
pub const TO_ENTITY_ID_ATTRIBUTE_ID: &str = "INTERACTION.toEntityId";

const PLACEHOLDER_ATTRIBUTE_IDS: [&str; 4] = [
    FROM_ENTITY_TYPE_ATTRIBUTE_ID,
    TO_ENTITY_TYPE_ATTRIBUTE_ID,
    FROM_ENTITY_ID_ATTRIBUTE_ID,
    TO_ENTITY_ID_ATTRIBUTE_ID,
];

fn is_placeholder(attribute_id: &str) -> bool {
    PLACEHOLDER_ATTRIBUTE_IDS.contains(&attribute_id)
}

/// Direction of the edges being resolved, seen from the requested entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionDirection {
    /// Edges where the requested entity is the callee.
    Incoming,
    /// Edges where the requested entity is the caller.
    Outgoing,
}

impl InteractionDirection {
    /// Side of the edge the requested entity sits on.
    pub fn this_side(self) -> InteractionSide {
        match self {
            InteractionDirection::Incoming => InteractionSide::Callee,
            InteractionDirection::Outgoing => InteractionSide::Caller,
        }
    }

    /// Side of the edge the other entity sits on.
    pub fn other_side(self) -> InteractionSide {
        match self {
            InteractionDirection::Incoming => InteractionSide::Caller,
            InteractionDirection::Outgoing => InteractionSide::Callee,
        }
    }

    fn missing_type_filter_message(self) -> &'static str {
        match self {
            InteractionDirection::Incoming => "fromEntityType filter is mandatory for incoming interactions",
            InteractionDirection::Outgoing => "toEntityType filter is mandatory for outgoing interactions",
        }
    }
}

/// Resolves interaction edges for already-fetched entities and attaches them
/// to the entity builders.
pub struct InteractionFetcher {
    client: BackendClient,
    catalog: Arc<dyn AttributeCatalog>,
    configs: Arc<EntityTypeConfigs>,
}

impl InteractionFetcher {
    pub fn new(client: BackendClient, catalog: Arc<dyn AttributeCatalog>, configs: Arc<EntityTypeConfigs>) -> Self {
        Self {
            client,
            catalog,
            configs,
        }
    }

    /// Populate the incoming and outgoing interactions requested by `request`
    /// on every entity in `response`.
    pub async fn populate(
        &self,
        ctx: &RequestContext,
        request: &EntitiesRequest,
        response: &mut EntityFetcherResponse,
    ) -> Result<()> {
        if let Some(interactions) = &request.incoming_interactions {
            self.add_interactions(ctx, request, interactions, InteractionDirection::Incoming, response)
                .await?;
        }
        if let Some(interactions) = &request.outgoing_interactions {
            self.add_interactions(ctx, request, interactions, InteractionDirection::Outgoing, response)
                .await?;
        }
        Ok(())
    }

    async fn add_interactions(
        &self,
        ctx: &RequestContext,
        request: &EntitiesRequest,
        interactions: &InteractionsRequest,
        direction: InteractionDirection,
        response: &mut EntityFetcherResponse,
    ) -> Result<()> {
        validate(interactions, direction)?;
        if response.is_empty() {
            return Ok(());
        }

        let keys: Vec<EntityKey> = response.keys().cloned().collect();
        let queries = self.build_query_requests(request, interactions, &keys, direction)?;
        if queries.is_empty() {
            return Err(Error::InvalidArgument(direction.missing_type_filter_message().to_string()));
        }

        let attributes = self.catalog.attributes(ctx, INTERACTION_SCOPE)?;
        let selection = SelectionIndex::new(&interactions.selection);

        // Independent per other-type queries; run sequentially.
        for (other_type, query) in queries {
            let chunks = self.client.execute(AttributeSource::Qs, ctx, query).await?;
            let layout = EdgeLayout {
                this_type: &request.entity_type,
                this_width: self
                    .configs
                    .interaction_id_attributes(&request.entity_type, direction.this_side())?
                    .len(),
                other_type: &other_type,
                other_width: self.other_columns(&other_type, direction.other_side())?.len(),
                direction,
            };

            for chunk in &chunks {
                let Some(metadata) = chunk_metadata(chunk) else {
                    break;
                };
                for row in &chunk.rows {
                    let this_key = EntityKey::from_row(row, layout.this_width)?;
                    let other_key = EntityKey::from_row_range(row, layout.this_width, layout.other_width)?;

                    let mut interaction = EntityInteraction::default();
                    layout.put_edge_attributes(&mut interaction, &selection.placeholders, &this_key, &other_key);

                    let first_value_column = layout.this_width + layout.other_width;
                    for (i, column) in metadata.column_metadata.iter().enumerate().skip(first_value_column) {
                        if column.column_name == COUNT_COLUMN_NAME {
                            continue;
                        }
                        let raw = row.column(i).cloned().unwrap_or(Value::Null);
                        if let Some(function) = selection.metrics.get(&column.column_name) {
                            let value = convert_value(&raw, metric_value_kind(function, &attributes)?)?;
                            interaction.metrics.insert(
                                column.column_name.clone(),
                                AggregatedMetricValue::new(function.function.name(), value),
                            );
                        } else {
                            let attribute_id = selection
                                .attributes
                                .get(&column.column_name)
                                .unwrap_or(&column.column_name);
                            interaction.attributes.insert(
                                column.column_name.clone(),
                                attribute_value(attribute_id, &raw, &attributes)?,
                            );
                        }
                    }

                    let Some(entity) = response.get_mut(&this_key) else {
                        warn!(entity = %this_key, "interaction row for an unknown entity, skipping");
                        continue;
                    };
                    debug!(entity = %this_key, other = %other_key, ?direction, "adding interaction");
                    match direction {
                        InteractionDirection::Incoming => entity.incoming_interactions.push(interaction),
                        InteractionDirection::Outgoing => entity.outgoing_interactions.push(interaction),
                    }
                }
            }
        }
        Ok(())
    }

    /// One grouped query per other entity type named by the request's type
    /// filter, keyed by that type.
    ///
    /// Each query restricts the interaction window to the request window and
    /// this entity's columns to `keys`, groups by this entity's columns then
    /// the other entity's, and selects them in that order followed by the
    /// requested metrics and attributes.
    pub fn build_query_requests(
        &self,
        request: &EntitiesRequest,
        interactions: &InteractionsRequest,
        keys: &[EntityKey],
        direction: InteractionDirection,
    ) -> Result<BTreeMap<String, QueryRequest>> {
        let Some(filter) = &interactions.filter else {
            return Ok(BTreeMap::new());
        };
        let other_types = other_entity_types(filter)?;
        if other_types.is_empty() {
            return Ok(BTreeMap::new());
        }

        let id_columns = self
            .configs
            .interaction_id_attributes(&request.entity_type, direction.this_side())?;
        let id_expressions: Vec<Expression> = id_columns
            .iter()
            .map(|column| Expression::attribute(column.as_str()))
            .collect();

        let mut selections: Vec<Expression> = interactions
            .selection
            .iter()
            .filter(|e| !e.attribute_id().is_some_and(is_placeholder))
            .map(|e| match e.as_function() {
                Some(function) => aliased(function),
                None => e.clone(),
            })
            .collect();
        if selections.is_empty() {
            selections.push(count_placeholder(&id_columns[0]));
        }

        let limit = if interactions.limit > 0 {
            interactions.limit
        } else {
            DEFAULT_GROUP_BY_LIMIT
        };

        let mut queries = BTreeMap::new();
        for other_type in other_types {
            let other_columns = self.other_columns(&other_type, direction.other_side())?;
            let other_expressions: Vec<Expression> = other_columns
                .iter()
                .map(|column| Expression::attribute(column.as_str()))
                .collect();

            let filter = Filter::and(vec![
                time_range_filter(
                    &self.configs.interaction_timestamp_attribute,
                    request.start_time_millis,
                    request.end_time_millis,
                ),
                entity_keys_filter(id_columns, keys),
                self.rewrite_filter(filter, &other_type)?,
            ]);

            let mut query = QueryRequest::default().with_filter(filter).with_limit(limit);
            query.group_by.extend(id_expressions.iter().cloned());
            query.group_by.extend(other_expressions.iter().cloned());
            query.selection.extend(id_expressions.iter().cloned());
            query.selection.extend(other_expressions);
            query.selection.extend(selections.iter().cloned());

            queries.insert(other_type, query);
        }
        Ok(queries)
    }

    /// Interaction columns of `other_type` on `side`. Configuration keys are
    /// upper case; the caller's spelling is kept everywhere else.
    fn other_columns(&self, other_type: &str, side: InteractionSide) -> Result<&[String]> {
        self.configs
            .interaction_id_attributes(&other_type.to_uppercase(), side)
    }

    /// Replace placeholder predicates with filters over `other_type`'s
    /// concrete interaction columns. Other predicates are kept as they are.
    fn rewrite_filter(&self, filter: &Filter, other_type: &str) -> Result<Filter> {
        match filter {
            Filter::Composite { operator, children } => Ok(Filter::Composite {
                operator: *operator,
                children: children
                    .iter()
                    .map(|child| self.rewrite_filter(child, other_type))
                    .collect::<Result<_>>()?,
            }),
            Filter::Predicate { lhs, rhs, .. } => {
                let (side, by_id) = match lhs.attribute_id() {
                    Some(FROM_ENTITY_TYPE_ATTRIBUTE_ID) => (InteractionSide::Caller, false),
                    Some(TO_ENTITY_TYPE_ATTRIBUTE_ID) => (InteractionSide::Callee, false),
                    Some(FROM_ENTITY_ID_ATTRIBUTE_ID) => (InteractionSide::Caller, true),
                    Some(TO_ENTITY_ID_ATTRIBUTE_ID) => (InteractionSide::Callee, true),
                    _ => return Ok(filter.clone()),
                };
                let columns = self.other_columns(other_type, side)?;
                if by_id {
                    Ok(entity_keys_filter(columns, entity_key_values(rhs)?.iter()))
                } else {
                    Ok(non_null_ids_filter(columns))
                }
            }
        }
    }
}

fn validate(interactions: &InteractionsRequest, direction: InteractionDirection) -> Result<()> {
    if interactions.filter.is_none() {
        return Err(Error::InvalidArgument(direction.missing_type_filter_message().to_string()));
    }
    if interactions.selection.is_empty() {
        return Err(Error::InvalidArgument(
            "interactions request should have non-empty selections".to_string(),
        ));
    }
    Ok(())
}

/// Entity types named by the first `fromEntityType`/`toEntityType`
/// predicate found depth first, as the caller spelled them.
fn other_entity_types(filter: &Filter) -> Result<BTreeSet<String>> {
    match filter {
        Filter::Composite { children, .. } => {
            for child in children {
                let types = other_entity_types(child)?;
                if !types.is_empty() {
                    return Ok(types);
                }
            }
            Ok(BTreeSet::new())
        }
        Filter::Predicate { lhs, rhs, .. } => match lhs.attribute_id() {
            Some(FROM_ENTITY_TYPE_ATTRIBUTE_ID) | Some(TO_ENTITY_TYPE_ATTRIBUTE_ID) => {
                Ok(string_values(rhs)?.into_iter().collect())
            }
            _ => Ok(BTreeSet::new()),
        },
    }
}

fn string_values(expression: &Expression) -> Result<Vec<String>> {
    match expression.as_literal() {
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(Value::StringArray(values)) => Ok(values.clone()),
        Some(other) => Err(Error::InvalidArgument(format!(
            "expected STRING value but received unhandled type: {:?}",
            other.value_type()
        ))),
        None => Err(Error::InvalidArgument(
            "interaction placeholder filters must compare against a literal".to_string(),
        )),
    }
}

fn entity_key_values(expression: &Expression) -> Result<Vec<EntityKey>> {
    let mut keys: Vec<EntityKey> = string_values(expression)?
        .iter()
        .map(|s| EntityKey::parse(s))
        .collect();
    keys.sort();
    keys.dedup();
    Ok(keys)
}

/// How a request's interaction selections map to result columns.
struct SelectionIndex {
    /// Placeholder attributes the caller selected.
    placeholders: HashSet<String>,
    /// Result name to function for metric selections.
    metrics: HashMap<String, FunctionExpression>,
    /// Result name to attribute id for attribute selections.
    attributes: HashMap<String, String>,
}

impl SelectionIndex {
    fn new(selection: &[Expression]) -> Self {
        let mut index = Self {
            placeholders: HashSet::new(),
            metrics: HashMap::new(),
            attributes: HashMap::new(),
        };
        for expression in selection {
            if let Some(function) = expression.as_function() {
                index.metrics.insert(function.result_name(), function.clone());
            } else if let Some(attribute_id) = expression.attribute_id() {
                if is_placeholder(attribute_id) {
                    index.placeholders.insert(attribute_id.to_string());
                } else {
                    index
                        .attributes
                        .insert(expression.result_name(), attribute_id.to_string());
                }
            }
        }
        index
    }
}

/// Column layout of one interaction query's rows.
struct EdgeLayout<'a> {
    this_type: &'a str,
    this_width: usize,
    other_type: &'a str,
    other_width: usize,
    direction: InteractionDirection,
}

impl EdgeLayout<'_> {
    fn put_edge_attributes(
        &self,
        interaction: &mut EntityInteraction,
        selected: &HashSet<String>,
        this_key: &EntityKey,
        other_key: &EntityKey,
    ) {
        let (from_type, from_key, to_type, to_key) = match self.direction {
            InteractionDirection::Incoming => (self.other_type, other_key, self.this_type, this_key),
            InteractionDirection::Outgoing => (self.this_type, this_key, self.other_type, other_key),
        };

        let edge = [
            (FROM_ENTITY_ID_ATTRIBUTE_ID, from_key.to_string()),
            (FROM_ENTITY_TYPE_ATTRIBUTE_ID, from_type.to_string()),
            (TO_ENTITY_ID_ATTRIBUTE_ID, to_key.to_string()),
            (TO_ENTITY_TYPE_ATTRIBUTE_ID, to_type.to_string()),
        ];
        for (attribute_id, value) in edge {
            if selected.contains(attribute_id) {
                interaction
                    .attributes
                    .insert(attribute_id.to_string(), Value::String(value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordedBackend;
    use crate::catalog::{AttributeMetadata, InMemoryAttributeCatalog};
    use crate::config::{EntityTypeConfig, InteractionConfig};
    use entigate_proto::{
        ColumnMetadata, FunctionType, Operator, ResultSetChunk, ResultSetMetadata, Row, ValueType,
    };
    use pretty_assertions::assert_eq;

    fn configs() -> EntityTypeConfigs {
        EntityTypeConfigs::new()
            .with_entity_type(
                "SERVICE",
                EntityTypeConfig::new(vec!["SERVICE.id".into()], "SERVICE.startTime"),
            )
            .with_interaction(
                "SERVICE",
                InteractionConfig::new(
                    vec!["INTERACTION.fromServiceId".into()],
                    vec!["INTERACTION.toServiceId".into()],
                ),
            )
            .with_interaction(
                "BACKEND",
                InteractionConfig::new(vec![], vec!["INTERACTION.toBackendId".into()]),
            )
    }

    fn fixture() -> (Arc<RecordedBackend>, InteractionFetcher) {
        let backend = Arc::new(RecordedBackend::new());
        let catalog = InMemoryAttributeCatalog::from_attributes(vec![
            AttributeMetadata::new(INTERACTION_SCOPE, "numCalls", ValueType::Long, vec![AttributeSource::Qs]),
            AttributeMetadata::new(INTERACTION_SCOPE, "protocol", ValueType::String, vec![AttributeSource::Qs]),
        ])
        .unwrap();
        let fetcher = InteractionFetcher::new(
            BackendClient::new(backend.clone()),
            Arc::new(catalog),
            Arc::new(configs()),
        );
        (backend, fetcher)
    }

    fn service_response(ids: &[&str]) -> EntityFetcherResponse {
        let mut response = EntityFetcherResponse::new();
        for id in ids {
            response.entity_mut(&EntityKey::single(*id), "SERVICE");
        }
        response
    }

    #[test]
    fn test_outgoing_query_per_other_type() {
        let (_, fetcher) = fixture();
        let request = EntitiesRequest::new("SERVICE", 1_000, 2_000);
        let interactions = InteractionsRequest::new(
            Filter::in_list(TO_ENTITY_TYPE_ATTRIBUTE_ID, vec!["service".into(), "BACKEND".into()]),
            vec![
                Expression::attribute(TO_ENTITY_ID_ATTRIBUTE_ID),
                Expression::aggregate(FunctionType::Sum, "INTERACTION.numCalls"),
            ],
        );
        let keys = [EntityKey::single("s1")];
        let queries = fetcher
            .build_query_requests(&request, &interactions, &keys, InteractionDirection::Outgoing)
            .unwrap();

        assert_eq!(queries.keys().cloned().collect::<Vec<_>>(), vec!["BACKEND", "service"]);
        let backend_query = &queries["BACKEND"];
        assert_eq!(
            backend_query.group_by,
            vec![
                Expression::attribute("INTERACTION.fromServiceId"),
                Expression::attribute("INTERACTION.toBackendId"),
            ]
        );
        assert_eq!(backend_query.selection.len(), 3);
        assert_eq!(backend_query.selection[2].alias(), Some("SUM_INTERACTION.numCalls"));
        assert_eq!(backend_query.limit, DEFAULT_GROUP_BY_LIMIT);
        assert_eq!(
            backend_query.filter,
            Some(Filter::and(vec![
                time_range_filter("INTERACTION.startTime", 1_000, 2_000),
                Filter::or(vec![Filter::and(vec![Filter::eq("INTERACTION.fromServiceId", "s1")])]),
                Filter::and(vec![Filter::neq("INTERACTION.toBackendId", "null")]),
            ]))
        );
    }

    #[test]
    fn test_incoming_rewrites_entity_id_filter() {
        let (_, fetcher) = fixture();
        let request = EntitiesRequest::new("SERVICE", 1_000, 2_000);
        let interactions = InteractionsRequest::new(
            Filter::and(vec![
                Filter::eq(FROM_ENTITY_TYPE_ATTRIBUTE_ID, "SERVICE"),
                Filter::eq(FROM_ENTITY_ID_ATTRIBUTE_ID, "s9"),
                Filter::compare("INTERACTION.numCalls", Operator::Gt, 5i64),
            ]),
            vec![Expression::attribute(FROM_ENTITY_ID_ATTRIBUTE_ID)],
        )
        .with_limit(50);
        let keys = [EntityKey::single("s1")];
        let queries = fetcher
            .build_query_requests(&request, &interactions, &keys, InteractionDirection::Incoming)
            .unwrap();

        let query = &queries["SERVICE"];
        assert_eq!(query.limit, 50);
        // Only placeholders were selected.
        assert_eq!(query.selection[2], count_placeholder("INTERACTION.toServiceId"));
        let Some(Filter::Composite { children, .. }) = &query.filter else {
            panic!("expected composite filter");
        };
        assert_eq!(
            children[2],
            Filter::and(vec![
                Filter::and(vec![Filter::neq("INTERACTION.fromServiceId", "null")]),
                Filter::or(vec![Filter::and(vec![Filter::eq("INTERACTION.fromServiceId", "s9")])]),
                Filter::compare("INTERACTION.numCalls", Operator::Gt, 5i64),
            ])
        );
    }

    #[test]
    fn test_other_type_without_columns_rejected() {
        let (_, fetcher) = fixture();
        let request = EntitiesRequest::new("SERVICE", 1_000, 2_000);
        // BACKEND has no caller-side columns.
        let interactions = InteractionsRequest::new(
            Filter::eq(FROM_ENTITY_TYPE_ATTRIBUTE_ID, "BACKEND"),
            vec![Expression::attribute(FROM_ENTITY_ID_ATTRIBUTE_ID)],
        );
        let result = fetcher.build_query_requests(
            &request,
            &interactions,
            &[EntityKey::single("s1")],
            InteractionDirection::Incoming,
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_missing_filter_and_selection() {
        let (backend, fetcher) = fixture();
        let ctx = RequestContext::new("t");
        let mut response = service_response(&["s1"]);

        let request = EntitiesRequest::new("SERVICE", 1_000, 2_000).with_incoming_interactions(InteractionsRequest {
            filter: None,
            selection: vec![Expression::attribute(FROM_ENTITY_ID_ATTRIBUTE_ID)],
            limit: 0,
        });
        let result = fetcher.populate(&ctx, &request, &mut response).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let request = EntitiesRequest::new("SERVICE", 1_000, 2_000).with_outgoing_interactions(
            InteractionsRequest::new(Filter::eq(TO_ENTITY_TYPE_ATTRIBUTE_ID, "SERVICE"), vec![]),
        );
        let result = fetcher.populate(&ctx, &request, &mut response).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let request = EntitiesRequest::new("SERVICE", 1_000, 2_000).with_outgoing_interactions(
            InteractionsRequest::new(
                Filter::compare("INTERACTION.numCalls", Operator::Gt, 1i64),
                vec![Expression::attribute(TO_ENTITY_ID_ATTRIBUTE_ID)],
            ),
        );
        let result = fetcher.populate(&ctx, &request, &mut response).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_populate_incoming_edges() {
        let (backend, fetcher) = fixture();
        let metadata = ResultSetMetadata::new(vec![
            ColumnMetadata::new("INTERACTION.toServiceId", ValueType::String),
            ColumnMetadata::new("INTERACTION.fromServiceId", ValueType::String),
            ColumnMetadata::new("SUM_INTERACTION.numCalls", ValueType::String),
            ColumnMetadata::new("INTERACTION.protocol", ValueType::String),
        ]);
        backend.push_chunks(
            AttributeSource::Qs,
            vec![ResultSetChunk::new(
                0,
                metadata,
                vec![
                    Row::new(vec!["s1".into(), "s2".into(), "7".into(), "HTTP".into()]),
                    Row::new(vec!["s-unknown".into(), "s2".into(), "1".into(), "GRPC".into()]),
                ],
            )
            .last()],
        );

        let request = EntitiesRequest::new("SERVICE", 1_000, 2_000).with_incoming_interactions(
            InteractionsRequest::new(
                Filter::eq(FROM_ENTITY_TYPE_ATTRIBUTE_ID, "SERVICE"),
                vec![
                    Expression::attribute(FROM_ENTITY_ID_ATTRIBUTE_ID),
                    Expression::attribute(FROM_ENTITY_TYPE_ATTRIBUTE_ID),
                    Expression::aggregate(FunctionType::Sum, "INTERACTION.numCalls"),
                    Expression::attribute("INTERACTION.protocol"),
                ],
            ),
        );
        let mut response = service_response(&["s1"]);
        fetcher
            .populate(&RequestContext::new("t"), &request, &mut response)
            .await
            .unwrap();

        let entity = response.get(&EntityKey::single("s1")).unwrap();
        assert_eq!(entity.incoming_interactions.len(), 1);
        assert!(entity.outgoing_interactions.is_empty());

        let edge = &entity.incoming_interactions[0];
        assert_eq!(edge.attributes[FROM_ENTITY_ID_ATTRIBUTE_ID], Value::from("s2"));
        assert_eq!(edge.attributes[FROM_ENTITY_TYPE_ATTRIBUTE_ID], Value::from("SERVICE"));
        assert!(!edge.attributes.contains_key(TO_ENTITY_ID_ATTRIBUTE_ID));
        assert_eq!(edge.attributes["INTERACTION.protocol"], Value::from("HTTP"));
        assert_eq!(edge.metrics["SUM_INTERACTION.numCalls"].value, Value::Long(7));
        assert_eq!(edge.metrics["SUM_INTERACTION.numCalls"].function, "SUM");

        assert_eq!(backend.requests_for(AttributeSource::Qs).len(), 1);
    }

    #[tokio::test]
    async fn test_reported_other_type_keeps_caller_spelling() {
        let (backend, fetcher) = fixture();
        let metadata = ResultSetMetadata::new(vec![
            ColumnMetadata::new("INTERACTION.fromServiceId", ValueType::String),
            ColumnMetadata::new("INTERACTION.toBackendId", ValueType::String),
            ColumnMetadata::new("Count", ValueType::String),
        ]);
        backend.push_chunks(
            AttributeSource::Qs,
            vec![ResultSetChunk::new(0, metadata, vec![Row::new(vec!["s1".into(), "b1".into(), "3".into()])]).last()],
        );

        let request = EntitiesRequest::new("SERVICE", 1_000, 2_000).with_outgoing_interactions(
            InteractionsRequest::new(
                Filter::eq(TO_ENTITY_TYPE_ATTRIBUTE_ID, "backend"),
                vec![
                    Expression::attribute(TO_ENTITY_ID_ATTRIBUTE_ID),
                    Expression::attribute(TO_ENTITY_TYPE_ATTRIBUTE_ID),
                ],
            ),
        );
        let mut response = service_response(&["s1"]);
        fetcher
            .populate(&RequestContext::new("t"), &request, &mut response)
            .await
            .unwrap();

        let entity = response.get(&EntityKey::single("s1")).unwrap();
        assert_eq!(entity.outgoing_interactions.len(), 1);
        let edge = &entity.outgoing_interactions[0];
        assert_eq!(edge.attributes[TO_ENTITY_ID_ATTRIBUTE_ID], Value::from("b1"));
        assert_eq!(edge.attributes[TO_ENTITY_TYPE_ATTRIBUTE_ID], Value::from("backend"));

        let queries = backend.requests_for(AttributeSource::Qs);
        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries[0].group_by,
            vec![
                Expression::attribute("INTERACTION.fromServiceId"),
                Expression::attribute("INTERACTION.toBackendId"),
            ]
        );
    }
}
