//! Event collection keyed by pre-existing event id.
//!
//! Core never creates or deletes events; the only mutation is the
//! `related_characters` edge list, reachable only from the relation ledger.

use crate::model::entity::EntityId;
use crate::model::event::{Event, EventId};
use crate::store::entity_store::{StoreError, StoreResult};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
    positions: HashMap<EventId, usize>,
}

impl EventStore {
    /// Builds the collection, rejecting duplicate ids.
    pub fn from_events(events: Vec<Event>) -> StoreResult<Self> {
        let mut positions = HashMap::with_capacity(events.len());
        for (position, event) in events.iter().enumerate() {
            if positions.insert(event.id.clone(), position).is_some() {
                return Err(StoreError::DuplicateId(event.id.clone()));
            }
        }
        Ok(Self { events, positions })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.positions.get(id).map(|&position| &self.events[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn year_of(&self, id: &str) -> Option<i32> {
        self.get(id).and_then(Event::year)
    }

    /// Snapshot in document order.
    pub fn all(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn related_characters_mut(&mut self, id: &str) -> Option<&mut Vec<EntityId>> {
        let position = *self.positions.get(id)?;
        Some(&mut self.events[position].related_characters)
    }

    pub(crate) fn events_mut(&mut self) -> impl Iterator<Item = &mut Event> {
        self.events.iter_mut()
    }
}
