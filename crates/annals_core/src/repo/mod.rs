//! Document persistence for the entity and event collections.
//!
//! # Responsibility
//! - Define the load/save contract services are driven through.
//! - Keep file format and atomic-replace details out of the store layer.
//!
//! # Invariants
//! - A failed load aborts the run; partial documents are never returned.
//! - Saves replace each document atomically.
//! - Mutating runs hold the writer lock for their whole duration.

pub mod document_repo;
pub mod writer_lock;
