//! Core domain logic for annals.
//! This crate owns entity identity, entity/event edges and scope audits.

pub mod config;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{Entity, EntityId, EntityValidationError, Lifespan, YearRange};
pub use model::event::{Event, EventDate, EventId};
pub use normalize::name_key::{NameKey, Normalizer};
pub use repo::document_repo::{
    load_batch, write_backup, DatasetRepository, JsonDocumentRepository, RepoError, RepoResult,
};
pub use repo::writer_lock::WriterLock;
pub use service::audit_service::{ApplyReport, AuditPartition, AuditReport, AuditService};
pub use service::coverage_service::{coverage, CoverageReport};
pub use service::reconcile_service::{
    expand_batch, BatchRecord, CandidateAssociation, CandidateAttributes, ItemOutcome,
    ReconcileReport, ReconcileService,
};
pub use store::entity_store::{EntityStore, MatchKind, StoreError, StoreResult};
pub use store::event_store::EventStore;
pub use store::id_allocator::IdAllocator;
pub use store::relation_ledger::{LedgerError, LinkOutcome, RelationLedger, RepairReport};
pub use store::Dataset;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
