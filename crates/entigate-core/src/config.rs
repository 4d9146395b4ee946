//! Entity type and interaction configuration.
//!
//! Loaded once at startup and shared read-only by every request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_interaction_timestamp() -> String {
    "INTERACTION.startTime".to_string()
}

/// Identity and time columns of one entity type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityTypeConfig {
    /// Ordered identity attribute ids. Their values form the entity key.
    pub id_attributes: Vec<String>,
    /// Attribute holding the event time in epoch milliseconds.
    pub timestamp_attribute: String,
}

impl EntityTypeConfig {
    pub fn new(id_attributes: Vec<String>, timestamp_attribute: impl Into<String>) -> Self {
        Self {
            id_attributes,
            timestamp_attribute: timestamp_attribute.into(),
        }
    }
}

/// Which end of an interaction edge an entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionSide {
    Caller,
    Callee,
}

/// Interaction-scope identity columns of one entity type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Columns identifying the entity when it is the caller.
    pub caller_side_attributes: Vec<String>,
    /// Columns identifying the entity when it is the callee.
    pub callee_side_attributes: Vec<String>,
}

impl InteractionConfig {
    pub fn new(caller_side_attributes: Vec<String>, callee_side_attributes: Vec<String>) -> Self {
        Self {
            caller_side_attributes,
            callee_side_attributes,
        }
    }

    /// Columns for `side`.
    pub fn side(&self, side: InteractionSide) -> &[String] {
        match side {
            InteractionSide::Caller => &self.caller_side_attributes,
            InteractionSide::Callee => &self.callee_side_attributes,
        }
    }
}

/// Configuration of every known entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeConfigs {
    #[serde(default)]
    pub entity_types: HashMap<String, EntityTypeConfig>,
    #[serde(default)]
    pub interactions: HashMap<String, InteractionConfig>,
    /// Timestamp attribute of the interaction scope.
    #[serde(default = "default_interaction_timestamp")]
    pub interaction_timestamp_attribute: String,
}

impl Default for EntityTypeConfigs {
    fn default() -> Self {
        Self {
            entity_types: HashMap::new(),
            interactions: HashMap::new(),
            interaction_timestamp_attribute: default_interaction_timestamp(),
        }
    }
}

impl EntityTypeConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>, config: EntityTypeConfig) -> Self {
        self.entity_types.insert(entity_type.into(), config);
        self
    }

    pub fn with_interaction(mut self, entity_type: impl Into<String>, config: InteractionConfig) -> Self {
        self.interactions.insert(entity_type.into(), config);
        self
    }

    pub fn with_interaction_timestamp(mut self, attribute_id: impl Into<String>) -> Self {
        self.interaction_timestamp_attribute = attribute_id.into();
        self
    }

    /// Configuration of `entity_type`.
    pub fn entity_type(&self, entity_type: &str) -> Result<&EntityTypeConfig> {
        self.entity_types
            .get(entity_type)
            .ok_or_else(|| Error::UnknownEntityType(entity_type.to_string()))
    }

    /// Ordered identity attribute ids of `entity_type`.
    pub fn id_attributes(&self, entity_type: &str) -> Result<&[String]> {
        Ok(&self.entity_type(entity_type)?.id_attributes)
    }

    /// Timestamp attribute id of `entity_type`.
    pub fn timestamp_attribute(&self, entity_type: &str) -> Result<&str> {
        Ok(&self.entity_type(entity_type)?.timestamp_attribute)
    }

    /// Interaction columns identifying `entity_type` on `side`.
    ///
    /// Entity types without interaction columns on that side are rejected.
    pub fn interaction_id_attributes(&self, entity_type: &str, side: InteractionSide) -> Result<&[String]> {
        let config = self.interactions.get(entity_type).ok_or_else(|| {
            Error::InvalidArgument(format!("unhandled interaction entity type: {}", entity_type))
        })?;
        let columns = config.side(side);
        if columns.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "no interaction columns for entity type {} on {:?} side",
                entity_type, side
            )));
        }
        Ok(columns)
    }
}
