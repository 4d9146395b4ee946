//! Entity-keyed partial results.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use entigate_proto::Entity;

use super::key::EntityKey;

/// Entities keyed by identity, in the order their keys were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityFetcherResponse {
    order: Vec<EntityKey>,
    entities: HashMap<EntityKey, Entity>,
}

impl EntityFetcherResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entity for `key`, created empty on first access.
    pub fn entity_mut(&mut self, key: &EntityKey, entity_type: &str) -> &mut Entity {
        match self.entities.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push(key.clone());
                entry.insert(Entity::new(entity_type))
            }
        }
    }

    /// The entity for `key`, if present.
    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Mutable access to an existing entity.
    pub fn get_mut(&mut self, key: &EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Insert or merge `entity` under `key`.
    pub fn insert(&mut self, key: EntityKey, entity: Entity) {
        match self.entities.entry(key) {
            Entry::Occupied(mut entry) => entry.get_mut().merge(entity),
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(entity);
            }
        }
    }

    /// Fold `other` into this response.
    ///
    /// Entities sharing a key are merged into one; keys new to this response
    /// are appended in `other`'s order.
    pub fn merge(&mut self, other: EntityFetcherResponse) {
        let EntityFetcherResponse {
            order,
            mut entities,
        } = other;
        for key in order {
            if let Some(entity) = entities.remove(&key) {
                self.insert(key, entity);
            }
        }
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.order.iter()
    }

    /// Entities in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &Entity)> {
        self.order
            .iter()
            .filter_map(move |key| self.entities.get(key).map(|e| (key, e)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Consume into entities in first-seen order.
    pub fn into_entities(self) -> Vec<Entity> {
        let EntityFetcherResponse {
            order,
            mut entities,
        } = self;
        order
            .into_iter()
            .filter_map(|key| entities.remove(&key))
            .collect()
    }
}
