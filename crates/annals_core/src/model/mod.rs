//! Domain model for the two linked collections.
//!
//! # Responsibility
//! - Define the entity (person) and event records as they appear on disk.
//! - Keep fields core does not interpret intact across rewrites.
//!
//! # Invariants
//! - Entity ids are allocated by core; event ids never are.
//! - `Entity::related_events` and `Event::related_characters` mirror each
//!   other (see `store::relation_ledger`).

pub mod entity;
pub mod event;
