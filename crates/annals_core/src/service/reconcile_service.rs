//! Candidate reconciliation use-case.
//!
//! # Responsibility
//! - Resolve each candidate name to an existing entity or create one.
//! - Link the resolved entity to the candidate's event through the ledger.
//! - Report one outcome per candidate plus summary counts.
//!
//! # Invariants
//! - Candidates are processed strictly in input order; an entity created by
//!   item N is visible to item N+1.
//! - A candidate naming a missing event mutates nothing.
//! - A failing item never rolls back earlier items.
//! - Re-running the same batch creates nothing and links nothing new.

use crate::config::{ConfigError, CoreConfig};
use crate::model::entity::{Entity, EntityId};
use crate::model::event::EventId;
use crate::store::id_allocator::{AllocatorError, IdAllocator};
use crate::store::relation_ledger::LinkOutcome;
use crate::store::Dataset;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// List fields every stored record carries, empty when the batch has none.
const REQUIRED_LIST_FIELDS: &[&str] = &["achievements", "journey"];

/// Optional attributes used only when a candidate creates a new entity.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateAttributes {
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub death_year: Option<i32>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Uninterpreted fields (achievements, journey, ...) copied onto created records.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One name/event pair to reconcile.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateAssociation {
    pub raw_name: String,
    /// `None` for a pure definition candidate.
    pub event_id: Option<EventId>,
    pub attributes: CandidateAttributes,
}

impl CandidateAssociation {
    pub fn new(raw_name: impl Into<String>, event_id: Option<&str>) -> Self {
        Self {
            raw_name: raw_name.into(),
            event_id: event_id.map(str::to_string),
            attributes: CandidateAttributes::default(),
        }
    }

    pub fn with_attributes(mut self, attributes: CandidateAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Batch document record.
///
/// `eventId` and `relatedEvents` may both be present; together they name the
/// events the person should be linked to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub name: String,
    #[serde(default)]
    pub event_id: Option<EventId>,
    #[serde(default)]
    pub related_events: Vec<EventId>,
    #[serde(flatten)]
    pub attributes: CandidateAttributes,
}

impl BatchRecord {
    /// Expands the record into one candidate per named event.
    pub fn into_candidates(self) -> Vec<CandidateAssociation> {
        let mut event_ids: Vec<EventId> = Vec::new();
        for event_id in self.event_id.into_iter().chain(self.related_events) {
            if !event_ids.contains(&event_id) {
                event_ids.push(event_id);
            }
        }
        if event_ids.is_empty() {
            return vec![CandidateAssociation {
                raw_name: self.name,
                event_id: None,
                attributes: self.attributes,
            }];
        }
        event_ids
            .into_iter()
            .map(|event_id| CandidateAssociation {
                raw_name: self.name.clone(),
                event_id: Some(event_id),
                attributes: self.attributes.clone(),
            })
            .collect()
    }
}

/// Flattens batch records into the ordered candidate list.
pub fn expand_batch(records: Vec<BatchRecord>) -> Vec<CandidateAssociation> {
    records
        .into_iter()
        .flat_map(BatchRecord::into_candidates)
        .collect()
}

/// Per-candidate result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemOutcome {
    Created { id: EntityId, placeholder: bool },
    Reused { id: EntityId },
    SkippedDuplicate { id: EntityId },
    EventNotFound { event_id: EventId },
    Failed { reason: String },
}

impl ItemOutcome {
    /// Entity the candidate resolved to, if any.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::Created { id, .. } | Self::Reused { id } | Self::SkippedDuplicate { id } => {
                Some(id)
            }
            Self::EventNotFound { .. } | Self::Failed { .. } => None,
        }
    }

    fn status(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Reused { .. } => "reused",
            Self::SkippedDuplicate { .. } => "skipped_duplicate",
            Self::EventNotFound { .. } => "event_not_found",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileItem {
    pub index: usize,
    pub name: String,
    pub event_id: Option<EventId>,
    pub outcome: ItemOutcome,
    /// Linked event year lies outside the entity's known lifespan.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub lifespan_conflict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub reused: usize,
    pub skipped: usize,
    /// Includes `event_not_found` items.
    pub failed: usize,
    pub placeholders: usize,
    pub lifespan_conflicts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub summary: ReconcileSummary,
    pub items: Vec<ReconcileItem>,
}

impl ReconcileReport {
    fn push(&mut self, item: ReconcileItem) {
        match &item.outcome {
            ItemOutcome::Created { placeholder, .. } => {
                self.summary.created += 1;
                if *placeholder {
                    self.summary.placeholders += 1;
                }
            }
            ItemOutcome::Reused { .. } => self.summary.reused += 1,
            ItemOutcome::SkippedDuplicate { .. } => self.summary.skipped += 1,
            ItemOutcome::EventNotFound { .. } | ItemOutcome::Failed { .. } => {
                self.summary.failed += 1
            }
        }
        if item.lifespan_conflict {
            self.summary.lifespan_conflicts += 1;
        }
        self.items.push(item);
    }

    /// Whether the run changed anything.
    pub fn has_changes(&self) -> bool {
        self.items.iter().any(|item| {
            matches!(item.outcome, ItemOutcome::Created { .. })
                || (matches!(item.outcome, ItemOutcome::Reused { .. }) && item.event_id.is_some())
        })
    }
}

/// Attribute values applied to newly created entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDefaults {
    pub role: String,
    pub biography: String,
    /// `{slug}` is substituted; `None` leaves `avatar` unset.
    pub avatar_template: Option<String>,
}

impl Default for EntityDefaults {
    fn default() -> Self {
        let config = CoreConfig::default();
        Self {
            role: config.default_role,
            biography: config.placeholder_biography,
            avatar_template: config.avatar_template,
        }
    }
}

/// Reconciliation engine facade.
#[derive(Debug, Clone, Default)]
pub struct ReconcileService {
    allocator: IdAllocator,
    defaults: EntityDefaults,
}

impl ReconcileService {
    pub fn new(allocator: IdAllocator, defaults: EntityDefaults) -> Self {
        Self {
            allocator,
            defaults,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Result<Self, ConfigError> {
        let avatar_template = config
            .avatar_template
            .clone()
            .filter(|template| !template.is_empty());
        Ok(Self::new(
            config.allocator()?,
            EntityDefaults {
                role: config.default_role.clone(),
                biography: config.placeholder_biography.clone(),
                avatar_template,
            },
        ))
    }

    /// Processes `batch` in order against `dataset`.
    pub fn reconcile(
        &self,
        dataset: &mut Dataset,
        batch: &[CandidateAssociation],
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for (index, candidate) in batch.iter().enumerate() {
            report.push(self.reconcile_one(dataset, index, candidate));
        }
        info!(
            "event=reconcile_batch module=reconcile status=ok items={} created={} reused={} skipped={} failed={}",
            report.items.len(),
            report.summary.created,
            report.summary.reused,
            report.summary.skipped,
            report.summary.failed
        );
        report
    }

    /// Runs the batch against a copy; `dataset` is left untouched.
    pub fn dry_run(&self, dataset: &Dataset, batch: &[CandidateAssociation]) -> ReconcileReport {
        let mut scratch = dataset.clone();
        let mut report = self.reconcile(&mut scratch, batch);
        report.dry_run = true;
        report
    }

    fn reconcile_one(
        &self,
        dataset: &mut Dataset,
        index: usize,
        candidate: &CandidateAssociation,
    ) -> ReconcileItem {
        let mut item = ReconcileItem {
            index,
            name: candidate.raw_name.clone(),
            event_id: candidate.event_id.clone(),
            outcome: ItemOutcome::Failed {
                reason: String::new(),
            },
            lifespan_conflict: false,
        };

        if let Some(event_id) = &candidate.event_id {
            if !dataset.events.contains(event_id) {
                warn!("event=reconcile_item module=reconcile status=event_not_found index={index} event_id={event_id}");
                item.outcome = ItemOutcome::EventNotFound {
                    event_id: event_id.clone(),
                };
                return item;
            }
        }

        if dataset.entities.normalizer().name_key(&candidate.raw_name).is_empty() {
            warn!("event=reconcile_item module=reconcile status=failed index={index} reason=blank_name");
            item.outcome = ItemOutcome::Failed {
                reason: "invalid name: blank after normalization".to_string(),
            };
            return item;
        }

        let existing = dataset
            .entities
            .find_by_name(&candidate.raw_name)
            .map(|entity| entity.id.clone());
        let (entity_id, created) = match existing {
            Some(id) => (id, None),
            None => match self.create_entity(dataset, candidate) {
                Ok((id, placeholder)) => (id, Some(placeholder)),
                Err(reason) => {
                    warn!("event=reconcile_item module=reconcile status=failed index={index} reason=create_rejected");
                    item.outcome = ItemOutcome::Failed { reason };
                    return item;
                }
            },
        };

        let mut link_outcome = None;
        if let Some(event_id) = &candidate.event_id {
            match dataset.ledger().link(&entity_id, event_id) {
                Ok(outcome) => link_outcome = Some(outcome),
                Err(err) => {
                    warn!("event=reconcile_item module=reconcile status=failed index={index} id={entity_id} reason=link_rejected");
                    item.outcome = ItemOutcome::Failed {
                        reason: err.to_string(),
                    };
                    return item;
                }
            }
            item.lifespan_conflict = self.lifespan_conflict(dataset, &entity_id, event_id);
            if item.lifespan_conflict {
                warn!("event=reconcile_item module=reconcile status=lifespan_conflict index={index} id={entity_id} event_id={event_id}");
            }
        }

        item.outcome = match (created, link_outcome) {
            (Some(placeholder), _) => ItemOutcome::Created {
                id: entity_id,
                placeholder,
            },
            (None, Some(LinkOutcome::AlreadyLinked)) => {
                ItemOutcome::SkippedDuplicate { id: entity_id }
            }
            (None, _) => ItemOutcome::Reused { id: entity_id },
        };
        info!(
            "event=reconcile_item module=reconcile status={} index={index} id={}",
            item.outcome.status(),
            item.outcome.entity_id().unwrap_or("-")
        );
        item
    }

    fn create_entity(
        &self,
        dataset: &mut Dataset,
        candidate: &CandidateAssociation,
    ) -> Result<(EntityId, bool), String> {
        let (entity, placeholder) = self
            .build_entity(dataset, candidate)
            .map_err(|err| err.to_string())?;
        let id = dataset
            .entities
            .insert(entity)
            .map_err(|err| err.to_string())?;
        Ok((id, placeholder))
    }

    /// Assembles a new record; the flag reports whether a default was used for
    /// role or biography.
    fn build_entity(
        &self,
        dataset: &Dataset,
        candidate: &CandidateAssociation,
    ) -> Result<(Entity, bool), AllocatorError> {
        let normalizer = dataset.entities.normalizer();
        let id = self.allocator.next(dataset.entities.ids())?;
        let attributes = &candidate.attributes;

        let mut entity = Entity::new(id, normalizer.display_form(&candidate.raw_name));
        entity.birth_year = attributes.birth_year;
        entity.death_year = attributes.death_year;
        entity.extra = attributes.extra.clone();
        entity.extra.remove("id");
        for field in REQUIRED_LIST_FIELDS {
            entity
                .extra
                .entry(*field)
                .or_insert_with(|| Value::Array(Vec::new()));
        }

        let mut placeholder = false;
        entity.role = Some(match non_blank(&attributes.role) {
            Some(role) => role,
            None => {
                placeholder = true;
                self.defaults.role.clone()
            }
        });
        entity.biography = Some(match non_blank(&attributes.biography) {
            Some(biography) => biography,
            None => {
                placeholder = true;
                self.defaults.biography.clone()
            }
        });
        entity.avatar = non_blank(&attributes.avatar).or_else(|| {
            self.defaults
                .avatar_template
                .as_ref()
                .map(|template| template.replace("{slug}", &normalizer.slug(&candidate.raw_name)))
        });
        Ok((entity, placeholder))
    }

    fn lifespan_conflict(&self, dataset: &Dataset, entity_id: &str, event_id: &str) -> bool {
        let Some(year) = dataset.events.year_of(event_id) else {
            return false;
        };
        dataset
            .entities
            .get(entity_id)
            .is_some_and(|entity| !entity.lifespan().admits(year))
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
