//! In-memory collections and their mutation contracts.
//!
//! # Responsibility
//! - Hold entities and events for the duration of one run.
//! - Route every edge write through `RelationLedger`.
//!
//! # Invariants
//! - Callers outside this module never touch the raw edge vectors.
//! - Execution is single-threaded; every call completes before the next.

pub mod entity_store;
pub mod event_store;
pub mod id_allocator;
pub mod relation_ledger;

use crate::model::entity::Entity;
use crate::model::event::Event;
use crate::normalize::name_key::Normalizer;
use entity_store::{EntityStore, StoreResult};
use event_store::EventStore;
use relation_ledger::RelationLedger;

/// Both collections of one run, loaded and saved together.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub entities: EntityStore,
    pub events: EventStore,
}

impl Dataset {
    pub fn new(entities: EntityStore, events: EventStore) -> Self {
        Self { entities, events }
    }

    /// Builds both stores from loaded documents.
    pub fn from_records(
        normalizer: Normalizer,
        entities: Vec<Entity>,
        events: Vec<Event>,
    ) -> StoreResult<Self> {
        Ok(Self {
            entities: EntityStore::from_entities(normalizer, entities)?,
            events: EventStore::from_events(events)?,
        })
    }

    pub fn ledger(&mut self) -> RelationLedger<'_> {
        RelationLedger::new(&mut self.entities, &mut self.events)
    }
}
