//! Entity (historical person) domain model.
//!
//! # Responsibility
//! - Define the canonical person record persisted in the entities document.
//! - Provide lifespan helpers used as a plausibility filter.
//!
//! # Invariants
//! - `id` is stable once assigned and never reused for another person.
//! - `name` is never blank.
//! - `death_year` is not earlier than `birth_year` when both are set.
//! - `related_events` holds no duplicates.
//!
//! # See also
//! - model/event.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::model::event::EventId;

/// Stable identifier of an entity, formatted `prefix-NNN`.
pub type EntityId = String;

/// Validation errors for entity invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    /// Display name is empty after trim.
    BlankName,
    /// `death_year` is earlier than `birth_year`.
    InvalidLifespan { birth: i32, death: i32 },
    /// `related_events` lists the same event more than once.
    DuplicateEventRef(EventId),
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "entity name must not be blank"),
            Self::InvalidLifespan { birth, death } => write!(
                f,
                "deathYear ({death}) must be >= birthYear ({birth})"
            ),
            Self::DuplicateEventRef(event_id) => {
                write!(f, "relatedEvents lists `{event_id}` more than once")
            }
        }
    }
}

impl Error for EntityValidationError {}

/// Canonical person record.
///
/// Fields the core does not interpret (achievements, journey, ...) are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Ordered set of linked event ids. Mutated only through the relation ledger.
    #[serde(default)]
    pub related_events: Vec<EventId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity {
    /// Creates a bare entity with no lifespan, attributes or links.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar: None,
            birth_year: None,
            death_year: None,
            biography: None,
            role: None,
            related_events: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Validates record-level invariants.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.name.trim().is_empty() {
            return Err(EntityValidationError::BlankName);
        }
        if let (Some(birth), Some(death)) = (self.birth_year, self.death_year) {
            if death < birth {
                return Err(EntityValidationError::InvalidLifespan { birth, death });
            }
        }
        for (index, event_id) in self.related_events.iter().enumerate() {
            if self.related_events[..index].contains(event_id) {
                return Err(EntityValidationError::DuplicateEventRef(event_id.clone()));
            }
        }
        Ok(())
    }

    pub fn lifespan(&self) -> Lifespan {
        Lifespan {
            birth: self.birth_year,
            death: self.death_year,
        }
    }

    pub fn is_linked_to(&self, event_id: &str) -> bool {
        self.related_events.iter().any(|id| id == event_id)
    }
}

/// Inclusive year interval used to scope audits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    /// Returns `None` when `start > end`.
    pub fn new(start: i32, end: i32) -> Option<Self> {
        if start > end {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }
}

impl Display for YearRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Birth/death pair where either side may be unknown (open bound).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifespan {
    pub birth: Option<i32>,
    pub death: Option<i32>,
}

impl Lifespan {
    /// Whether the lifespan overlaps `range`. Unknown bounds never exclude.
    pub fn intersects(&self, range: &YearRange) -> bool {
        let starts_before_end = self.birth.map_or(true, |birth| birth <= range.end);
        let ends_after_start = self.death.map_or(true, |death| death >= range.start);
        starts_before_end && ends_after_start
    }

    /// Whether `year` could fall within this lifespan.
    pub fn admits(&self, year: i32) -> bool {
        self.birth.map_or(true, |birth| birth <= year) && self.death.map_or(true, |death| year <= death)
    }

    pub fn is_unknown(&self) -> bool {
        self.birth.is_none() && self.death.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{Entity, EntityValidationError, Lifespan, YearRange};

    #[test]
    fn unknown_lifespan_intersects_any_range() {
        let range = YearRange::new(1858, 1930).unwrap();
        assert!(Lifespan::default().intersects(&range));
        assert!(Lifespan::default().is_unknown());
    }

    #[test]
    fn half_open_lifespan_uses_known_bound() {
        let range = YearRange::new(1858, 1930).unwrap();
        let born_late = Lifespan {
            birth: Some(1940),
            death: None,
        };
        let died_early = Lifespan {
            birth: None,
            death: Some(1800),
        };
        assert!(!born_late.intersects(&range));
        assert!(!died_early.intersects(&range));
    }

    #[test]
    fn year_range_rejects_reversed_bounds() {
        assert!(YearRange::new(1930, 1858).is_none());
        assert!(YearRange::new(1900, 1900).unwrap().contains(1900));
    }

    #[test]
    fn validate_rejects_duplicate_event_refs() {
        let mut entity = Entity::new("char-001", "Trương Định");
        entity.related_events = vec!["event-016".into(), "event-016".into()];
        assert_eq!(
            entity.validate().unwrap_err(),
            EntityValidationError::DuplicateEventRef("event-016".into())
        );
    }
}
