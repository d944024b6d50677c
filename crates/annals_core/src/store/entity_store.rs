//! Entity store with name-based identity resolution.
//!
//! # Responsibility
//! - Own the authoritative copy of every entity record.
//! - Keep the normalized-key and honorific-free indexes in step with records.
//!
//! # Invariants
//! - Normalized keys are unique across the store.
//! - Record order is insertion order and survives removals of other records.
//! - `insert` never overwrites; `remove` is the only way a record disappears.
//! - Indexes are updated in the same call as the record vector, so no caller
//!   observes them out of sync.

use crate::model::entity::{Entity, EntityId, EntityValidationError};
use crate::model::event::EventId;
use crate::normalize::name_key::{NameKey, Normalizer};
use log::debug;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from entity/event store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Normalized name already maps to an existing entity.
    DuplicateKey { key: String, existing: EntityId },
    /// Identifier already present in the collection.
    DuplicateId(String),
    /// Identifier absent from the collection.
    NotFound(String),
    /// Record violates a model invariant.
    Validation {
        id: String,
        source: EntityValidationError,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey { key, existing } => {
                write!(f, "normalized name `{key}` already belongs to {existing}")
            }
            Self::DuplicateId(id) => write!(f, "duplicate id: {id}"),
            Self::NotFound(id) => write!(f, "not found: {id}"),
            Self::Validation { id, source } => write!(f, "invalid record {id}: {source}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// How a name lookup matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Normalized keys are equal.
    Exact,
    /// Matched through the honorific-free key.
    Bare,
}

#[derive(Debug, Clone)]
pub struct EntityStore {
    normalizer: Normalizer,
    entities: Vec<Entity>,
    positions: HashMap<EntityId, usize>,
    key_index: HashMap<String, EntityId>,
    bare_index: HashMap<String, Vec<EntityId>>,
}

impl EntityStore {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            entities: Vec::new(),
            positions: HashMap::new(),
            key_index: HashMap::new(),
            bare_index: HashMap::new(),
        }
    }

    /// Builds a store from loaded records, preserving their order.
    ///
    /// # Errors
    /// - `Validation` when a record breaks a model invariant.
    /// - `DuplicateId` / `DuplicateKey` when two records collide.
    pub fn from_entities(normalizer: Normalizer, entities: Vec<Entity>) -> StoreResult<Self> {
        let mut store = Self::new(normalizer);
        for entity in entities {
            store.insert(entity)?;
        }
        Ok(store)
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.positions.get(id).map(|&position| &self.entities[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Snapshot in insertion order.
    pub fn all(&self) -> &[Entity] {
        &self.entities
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|entity| entity.id.as_str())
    }

    /// Resolves a raw name to a stored entity.
    pub fn find_by_name(&self, raw: &str) -> Option<&Entity> {
        self.resolve(raw).map(|(entity, _)| entity)
    }

    /// Resolves a raw name and reports how it matched.
    ///
    /// A bare-key match is accepted only when exactly one stored entity shares
    /// the honorific-free key and at least one side of the match is untitled,
    /// so two differently-titled names never merge through their bare form.
    pub fn resolve(&self, raw: &str) -> Option<(&Entity, MatchKind)> {
        let name_key = self.normalizer.name_key(raw);
        if name_key.is_empty() {
            return None;
        }
        if let Some(id) = self.key_index.get(&name_key.key) {
            return self.get(id).map(|entity| (entity, MatchKind::Exact));
        }

        let sharing = self.bare_index.get(&name_key.bare)?;
        if sharing.len() != 1 {
            debug!(
                "event=name_resolve module=store status=ambiguous candidates={}",
                sharing.len()
            );
            return None;
        }
        let entity = self.get(&sharing[0])?;
        if name_key.is_titled() {
            let stored_key = self.normalizer.normalize(&entity.name);
            if stored_key != name_key.bare {
                return None;
            }
        }
        Some((entity, MatchKind::Bare))
    }

    /// Inserts a new entity and returns its id.
    ///
    /// Callers resolve names with `find_by_name` first; this method refuses to
    /// shadow an existing identity rather than overwriting it.
    pub fn insert(&mut self, entity: Entity) -> StoreResult<EntityId> {
        entity.validate().map_err(|source| StoreError::Validation {
            id: entity.id.clone(),
            source,
        })?;
        if self.positions.contains_key(&entity.id) {
            return Err(StoreError::DuplicateId(entity.id));
        }
        let NameKey { key, bare } = self.normalizer.name_key(&entity.name);
        if let Some(existing) = self.key_index.get(&key) {
            return Err(StoreError::DuplicateKey {
                key,
                existing: existing.clone(),
            });
        }

        let id = entity.id.clone();
        self.positions.insert(id.clone(), self.entities.len());
        self.key_index.insert(key, id.clone());
        self.bare_index.entry(bare).or_default().push(id.clone());
        self.entities.push(entity);
        Ok(id)
    }

    /// Removes an entity and returns the removed record.
    ///
    /// Edges must already be detached (`RelationLedger::unlink_all_for_entity`).
    pub fn remove(&mut self, id: &str) -> StoreResult<Entity> {
        let position = self
            .positions
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let entity = self.entities.remove(position);
        for moved in &self.entities[position..] {
            if let Some(slot) = self.positions.get_mut(&moved.id) {
                *slot -= 1;
            }
        }

        let NameKey { key, bare } = self.normalizer.name_key(&entity.name);
        self.key_index.remove(&key);
        if let Some(ids) = self.bare_index.get_mut(&bare) {
            ids.retain(|candidate| candidate != id);
            if ids.is_empty() {
                self.bare_index.remove(&bare);
            }
        }
        Ok(entity)
    }

    /// Mutable edge list of one entity. Only the relation ledger writes here.
    pub(crate) fn related_events_mut(&mut self, id: &str) -> Option<&mut Vec<EventId>> {
        let position = *self.positions.get(id)?;
        Some(&mut self.entities[position].related_events)
    }

    pub(crate) fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }
}
