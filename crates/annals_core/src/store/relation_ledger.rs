//! Bidirectional entity <-> event edge maintenance.
//!
//! # Responsibility
//! - Write every edge to both `Entity::related_events` and
//!   `Event::related_characters` in one call.
//! - Restore symmetry on loaded documents that drifted apart.
//!
//! # Invariants
//! - After any public mutator returns, event E lists entity X iff entity X
//!   lists event E.
//! - Endpoints are checked before the first write, so a failing `link`
//!   leaves both collections untouched.
//! - `link`/`unlink` are idempotent.

use crate::model::entity::EntityId;
use crate::model::event::EventId;
use crate::store::entity_store::EntityStore;
use crate::store::event_store::EventStore;
use log::debug;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    EntityNotFound(EntityId),
    EventNotFound(EventId),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntityNotFound(id) => write!(f, "entity not found: {id}"),
            Self::EventNotFound(id) => write!(f, "event not found: {id}"),
        }
    }
}

impl Error for LedgerError {}

/// Result of a `link` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// At least one side gained the edge.
    Linked,
    /// Both sides already held the edge; nothing changed.
    AlreadyLinked,
}

/// Counts from a symmetry repair pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RepairReport {
    /// Half-present edges completed on the missing side.
    pub restored: usize,
    /// References to ids absent from the other collection, removed.
    pub dropped_dangling: usize,
    /// Repeated references collapsed to one.
    pub dropped_duplicates: usize,
}

/// Mutable view over both collections for edge writes.
pub struct RelationLedger<'a> {
    entities: &'a mut EntityStore,
    events: &'a mut EventStore,
}

impl<'a> RelationLedger<'a> {
    pub fn new(entities: &'a mut EntityStore, events: &'a mut EventStore) -> Self {
        Self { entities, events }
    }

    /// Adds the edge on both sides.
    ///
    /// # Errors
    /// - `EntityNotFound` / `EventNotFound` when an endpoint is absent; no
    ///   side is written in that case.
    pub fn link(&mut self, entity_id: &str, event_id: &str) -> LedgerResult<LinkOutcome> {
        if !self.entities.contains(entity_id) {
            return Err(LedgerError::EntityNotFound(entity_id.to_string()));
        }
        if !self.events.contains(event_id) {
            return Err(LedgerError::EventNotFound(event_id.to_string()));
        }

        let mut changed = false;
        if let Some(related_events) = self.entities.related_events_mut(entity_id) {
            if !related_events.iter().any(|id| id == event_id) {
                related_events.push(event_id.to_string());
                changed = true;
            }
        }
        if let Some(related_characters) = self.events.related_characters_mut(event_id) {
            if !related_characters.iter().any(|id| id == entity_id) {
                related_characters.push(entity_id.to_string());
                changed = true;
            }
        }

        if changed {
            debug!("event=link module=ledger status=linked entity_id={entity_id} event_id={event_id}");
            Ok(LinkOutcome::Linked)
        } else {
            Ok(LinkOutcome::AlreadyLinked)
        }
    }

    /// Removes the edge from both sides. Returns whether anything was removed;
    /// unknown ids are a no-op.
    pub fn unlink(&mut self, entity_id: &str, event_id: &str) -> bool {
        let mut removed = false;
        if let Some(related_events) = self.entities.related_events_mut(entity_id) {
            let before = related_events.len();
            related_events.retain(|id| id != event_id);
            removed |= related_events.len() != before;
        }
        if let Some(related_characters) = self.events.related_characters_mut(event_id) {
            let before = related_characters.len();
            related_characters.retain(|id| id != entity_id);
            removed |= related_characters.len() != before;
        }
        removed
    }

    /// Detaches an entity from every event and clears its own edge list.
    ///
    /// Every event is scanned, not only the ones the entity lists, so
    /// half-present edges are detached too. Returns the number of edges
    /// removed (an edge present on both sides counts once).
    pub fn unlink_all_for_entity(&mut self, entity_id: &str) -> usize {
        let mut detached: HashSet<EventId> = HashSet::new();
        for event in self.events.events_mut() {
            let before = event.related_characters.len();
            event.related_characters.retain(|id| id != entity_id);
            if event.related_characters.len() != before {
                detached.insert(event.id.clone());
            }
        }
        if let Some(related_events) = self.entities.related_events_mut(entity_id) {
            detached.extend(related_events.drain(..));
        }
        debug!(
            "event=unlink_all module=ledger status=ok entity_id={entity_id} detached={}",
            detached.len()
        );
        detached.len()
    }

    /// Restores symmetry across both collections.
    ///
    /// Edges whose endpoints both exist are completed on the missing side;
    /// references to absent ids are dropped; duplicates are collapsed.
    pub fn repair(&mut self) -> RepairReport {
        let mut report = RepairReport::default();
        let mut missing_on_events: Vec<(EventId, EntityId)> = Vec::new();
        let mut missing_on_entities: Vec<(EntityId, EventId)> = Vec::new();

        for entity in self.entities.entities_mut() {
            let mut seen = HashSet::new();
            let before = entity.related_events.len();
            entity.related_events.retain(|id| seen.insert(id.clone()));
            report.dropped_duplicates += before - entity.related_events.len();

            let before = entity.related_events.len();
            entity.related_events.retain(|id| self.events.contains(id));
            report.dropped_dangling += before - entity.related_events.len();

            for event_id in &entity.related_events {
                let listed = self
                    .events
                    .get(event_id)
                    .is_some_and(|event| event.references(&entity.id));
                if !listed {
                    missing_on_events.push((event_id.clone(), entity.id.clone()));
                }
            }
        }

        for event in self.events.events_mut() {
            let mut seen = HashSet::new();
            let before = event.related_characters.len();
            event.related_characters.retain(|id| seen.insert(id.clone()));
            report.dropped_duplicates += before - event.related_characters.len();

            let before = event.related_characters.len();
            event
                .related_characters
                .retain(|id| self.entities.contains(id));
            report.dropped_dangling += before - event.related_characters.len();

            for entity_id in &event.related_characters {
                let listed = self
                    .entities
                    .get(entity_id)
                    .is_some_and(|entity| entity.is_linked_to(&event.id));
                if !listed {
                    missing_on_entities.push((entity_id.clone(), event.id.clone()));
                }
            }
        }

        for (event_id, entity_id) in missing_on_events {
            if let Some(related_characters) = self.events.related_characters_mut(&event_id) {
                related_characters.push(entity_id);
                report.restored += 1;
            }
        }
        for (entity_id, event_id) in missing_on_entities {
            if let Some(related_events) = self.entities.related_events_mut(&entity_id) {
                related_events.push(event_id);
                report.restored += 1;
            }
        }
        report
    }
}
