//! Coverage summary for verification runs.
//!
//! Read-only; counts edges from the event side.

use crate::model::entity::EntityId;
use crate::store::Dataset;
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DecadeCoverage {
    /// First year of the decade (`1880` covers 1880-1889).
    pub decade: i32,
    pub events: usize,
    pub events_with_entities: usize,
    pub links: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedEntity {
    pub id: EntityId,
    pub name: String,
    pub events: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CoverageReport {
    pub total_entities: usize,
    pub total_events: usize,
    pub events_with_entities: usize,
    pub events_without_entities: usize,
    pub total_links: usize,
    /// Events without a year are left out of the breakdown.
    pub by_decade: Vec<DecadeCoverage>,
    pub most_linked: Vec<LinkedEntity>,
}

/// Builds the report; `top` bounds `most_linked`.
pub fn coverage(dataset: &Dataset, top: usize) -> CoverageReport {
    let mut report = CoverageReport {
        total_entities: dataset.entities.len(),
        total_events: dataset.events.len(),
        ..CoverageReport::default()
    };
    let mut decades: BTreeMap<i32, DecadeCoverage> = BTreeMap::new();

    for event in dataset.events.all() {
        let links = event.related_characters.len();
        report.total_links += links;
        if links > 0 {
            report.events_with_entities += 1;
        } else {
            report.events_without_entities += 1;
        }
        if let Some(year) = event.year() {
            let decade = year.div_euclid(10) * 10;
            let entry = decades.entry(decade).or_insert(DecadeCoverage {
                decade,
                ..DecadeCoverage::default()
            });
            entry.events += 1;
            entry.links += links;
            if links > 0 {
                entry.events_with_entities += 1;
            }
        }
    }
    report.by_decade = decades.into_values().collect();

    let mut linked: Vec<LinkedEntity> = dataset
        .entities
        .all()
        .iter()
        .filter(|entity| !entity.related_events.is_empty())
        .map(|entity| LinkedEntity {
            id: entity.id.clone(),
            name: entity.name.clone(),
            events: entity.related_events.len(),
        })
        .collect();
    // Stable sort keeps store order among ties.
    linked.sort_by(|a, b| b.events.cmp(&a.events));
    linked.truncate(top);
    report.most_linked = linked;
    report
}
