//! Scope audit and removal use-case.
//!
//! # Responsibility
//! - Partition entities into keep/remove for an in-scope year range.
//! - Surface read-only integrity findings (orphan events, dangling and
//!   asymmetric edges).
//! - Apply a partition: detach every edge of a removed entity, then remove it.
//!
//! # Invariants
//! - `audit` never mutates.
//! - `apply` detaches before removing, so no event is left pointing at a
//!   removed id.
//! - An entity is kept iff it has an in-scope link and a lifespan
//!   intersecting the scope, or it is pinned. An unknown lifespan bound never
//!   counts against the entity.

use crate::model::entity::{Entity, EntityId, YearRange};
use crate::model::event::EventId;
use crate::store::entity_store::{StoreError, StoreResult};
use crate::store::Dataset;
use log::info;
use serde::Serialize;

/// One entity the rule would drop, with the reasons that applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalCandidate {
    pub id: EntityId,
    pub name: String,
    pub no_link_in_scope: bool,
    pub outside_lifespan: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditPartition {
    pub scope: YearRange,
    pub keep: Vec<EntityId>,
    pub remove: Vec<RemovalCandidate>,
    /// Pinned entities the rule alone would have removed.
    pub pinned_overrides: Vec<EntityId>,
    /// Pin names that resolved to no entity.
    pub unresolved_pins: Vec<String>,
}

/// Which side of a relation lists the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSide {
    Entity,
    Event,
}

/// A reference whose target id is absent from the other collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingEdge {
    /// Side holding the reference.
    pub holder: EdgeSide,
    pub holder_id: String,
    pub missing_id: String,
}

/// An edge listed on only one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AsymmetricEdge {
    pub entity_id: EntityId,
    pub event_id: EventId,
    pub listed_by: EdgeSide,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AuditFindings {
    /// In-scope events without any entity reference.
    pub events_without_entities: Vec<EventId>,
    pub dangling_edges: Vec<DanglingEdge>,
    pub asymmetric_edges: Vec<AsymmetricEdge>,
}

impl AuditFindings {
    pub fn is_clean(&self) -> bool {
        self.events_without_entities.is_empty()
            && self.dangling_edges.is_empty()
            && self.asymmetric_edges.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub partition: AuditPartition,
    pub findings: AuditFindings,
}

/// Result of applying a partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyReport {
    /// Removed records, for the backup document.
    pub removed: Vec<Entity>,
    pub detached_edges: usize,
}

/// Integrity auditor facade.
#[derive(Debug, Clone, Default)]
pub struct AuditService {
    pinned: Vec<String>,
}

impl AuditService {
    /// `pinned` names are retained regardless of the rule.
    pub fn new(pinned: Vec<String>) -> Self {
        Self { pinned }
    }

    /// Computes the partition and findings for `scope`.
    pub fn audit(&self, dataset: &Dataset, scope: YearRange) -> AuditReport {
        let partition = self.partition(dataset, scope);
        let findings = findings(dataset, scope);
        info!(
            "event=audit module=audit status=ok scope={scope} keep={} remove={} pinned_overrides={} orphan_events={} dangling={} asymmetric={}",
            partition.keep.len(),
            partition.remove.len(),
            partition.pinned_overrides.len(),
            findings.events_without_entities.len(),
            findings.dangling_edges.len(),
            findings.asymmetric_edges.len()
        );
        AuditReport {
            partition,
            findings,
        }
    }

    /// Splits entities into keep/remove, in store order.
    pub fn partition(&self, dataset: &Dataset, scope: YearRange) -> AuditPartition {
        let mut pinned_ids: Vec<EntityId> = Vec::new();
        let mut unresolved_pins = Vec::new();
        for name in &self.pinned {
            match dataset.entities.find_by_name(name) {
                Some(entity) => pinned_ids.push(entity.id.clone()),
                None => unresolved_pins.push(name.clone()),
            }
        }

        let mut partition = AuditPartition {
            scope,
            keep: Vec::new(),
            remove: Vec::new(),
            pinned_overrides: Vec::new(),
            unresolved_pins,
        };
        for entity in dataset.entities.all() {
            let has_link_in_scope = entity.related_events.iter().any(|event_id| {
                dataset
                    .events
                    .year_of(event_id)
                    .is_some_and(|year| scope.contains(year))
            });
            let lived_in_scope = entity.lifespan().intersects(&scope);

            if has_link_in_scope && lived_in_scope {
                partition.keep.push(entity.id.clone());
            } else if pinned_ids.contains(&entity.id) {
                partition.keep.push(entity.id.clone());
                partition.pinned_overrides.push(entity.id.clone());
            } else {
                partition.remove.push(RemovalCandidate {
                    id: entity.id.clone(),
                    name: entity.name.clone(),
                    no_link_in_scope: !has_link_in_scope,
                    outside_lifespan: !lived_in_scope,
                });
            }
        }
        partition
    }

    /// Detaches and removes every entity in `partition.remove`.
    ///
    /// # Errors
    /// - `NotFound` when a listed id is no longer in the store; nothing is
    ///   changed in that case.
    pub fn apply(&self, dataset: &mut Dataset, partition: &AuditPartition) -> StoreResult<ApplyReport> {
        if let Some(missing) = partition
            .remove
            .iter()
            .find(|candidate| !dataset.entities.contains(&candidate.id))
        {
            return Err(StoreError::NotFound(missing.id.clone()));
        }

        let mut report = ApplyReport {
            removed: Vec::with_capacity(partition.remove.len()),
            detached_edges: 0,
        };
        for candidate in &partition.remove {
            report.detached_edges += dataset.ledger().unlink_all_for_entity(&candidate.id);
            report.removed.push(dataset.entities.remove(&candidate.id)?);
        }
        info!(
            "event=audit_apply module=audit status=ok removed={} detached_edges={}",
            report.removed.len(),
            report.detached_edges
        );
        Ok(report)
    }
}

/// Read-only integrity scan.
pub fn findings(dataset: &Dataset, scope: YearRange) -> AuditFindings {
    let mut findings = AuditFindings::default();

    for event in dataset.events.all() {
        let in_scope = event.year().is_some_and(|year| scope.contains(year));
        if in_scope && event.related_characters.is_empty() {
            findings.events_without_entities.push(event.id.clone());
        }
    }

    for entity in dataset.entities.all() {
        for event_id in &entity.related_events {
            match dataset.events.get(event_id) {
                None => findings.dangling_edges.push(DanglingEdge {
                    holder: EdgeSide::Entity,
                    holder_id: entity.id.clone(),
                    missing_id: event_id.clone(),
                }),
                Some(event) if !event.references(&entity.id) => {
                    findings.asymmetric_edges.push(AsymmetricEdge {
                        entity_id: entity.id.clone(),
                        event_id: event_id.clone(),
                        listed_by: EdgeSide::Entity,
                    })
                }
                Some(_) => {}
            }
        }
    }

    for event in dataset.events.all() {
        for entity_id in &event.related_characters {
            match dataset.entities.get(entity_id) {
                None => findings.dangling_edges.push(DanglingEdge {
                    holder: EdgeSide::Event,
                    holder_id: event.id.clone(),
                    missing_id: entity_id.clone(),
                }),
                Some(entity) if !entity.is_linked_to(&event.id) => {
                    findings.asymmetric_edges.push(AsymmetricEdge {
                        entity_id: entity_id.clone(),
                        event_id: event.id.clone(),
                        listed_by: EdgeSide::Event,
                    })
                }
                Some(_) => {}
            }
        }
    }
    findings
}
