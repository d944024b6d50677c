//! Use-case services over a loaded `Dataset`.
//!
//! # Responsibility
//! - Reconcile candidate associations into entities and edges.
//! - Audit entities against an in-scope year range and apply removals.
//! - Summarize coverage for verification.
//!
//! # Invariants
//! - Services mutate only through `EntityStore` and `RelationLedger`.
//! - Item-level failures become report entries; services never abort a batch.

pub mod audit_service;
pub mod coverage_service;
pub mod reconcile_service;
