//! Event domain model.
//!
//! Events are owned by the surrounding content pipeline. Core only reads
//! `id` and `date.year` and mutates `related_characters`; everything else
//! is carried through opaquely.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::entity::EntityId;

/// Pre-existing event identifier. Never allocated by core.
pub type EventId = String;

/// Partial calendar date of an event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventDate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u8>,
}

/// One dated historical occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<EventDate>,
    /// Ordered set of linked entity ids. Mutated only through the relation ledger.
    #[serde(default)]
    pub related_characters: Vec<EntityId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn new(id: impl Into<EventId>, year: Option<i32>) -> Self {
        Self {
            id: id.into(),
            date: year.map(|year| EventDate {
                year: Some(year),
                ..EventDate::default()
            }),
            related_characters: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.date.as_ref().and_then(|date| date.year)
    }

    /// Display name when the document carries one.
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }

    pub fn references(&self, entity_id: &str) -> bool {
        self.related_characters.iter().any(|id| id == entity_id)
    }
}
