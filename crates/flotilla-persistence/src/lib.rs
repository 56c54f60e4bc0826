//! Flotilla Persistence - Database entities and persistence layer
//!
//! This crate provides:
//! - SeaORM entity definitions for the fleet inventory schema
//! - Persistence trait abstractions, one per concern
//! - Domain model types (statuses, observations, reconciliation deltas)
//! - The SQL backend applying whole reconciliation batches transactionally

pub mod entity;
pub mod model;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export persistence traits
pub use traits::{
    CatalogPersistence, EurekaPersistence, EventPersistence, GroupPersistence,
    HaproxyPersistence, InstancePersistence, MappingPersistence, PersistenceService,
    ServerPersistence, TagPersistence, TaskPersistence,
};

// Re-export SQL backend
pub use sql::ExternalDbPersistService;

// Re-export model types
pub use model::{
    AppliedEureka, AppliedHaproxy, AppliedInstances, BackendSummary, BatchGrouping,
    EurekaDelta, EurekaStatus, FieldChange, HaproxyDelta, HaproxyStatus, InstanceDelta,
    InstanceDetail, InstanceObservation, InstanceSearchFilter, MappingAction,
    MappingEntityType, MappingReason, NewTask, PlanTarget, ServerStatus, SourceBatch,
    TaskFilter, TaskStatus, TaskType,
};
