//! Flotilla Reconcile - merging observations into the inventory
//!
//! This crate provides:
//! - Pure reconciliation functions computing deltas from
//!   `(prior rows, observation batch)` per source kind
//! - The mapping engine resolving HAProxy members and Eureka instances to
//!   logical application instances
//! - The reconcile driver consuming collector batches one at a time
//! - The periodic purge pass hard-deleting expired tombstones

pub mod driver;
pub mod mapping;
pub mod purge;
pub mod reconciler;

pub use driver::ReconcileDriver;
pub use mapping::{MapTarget, MappingService, Resolution, resolve_candidates};
pub use purge::PurgeService;
pub use reconciler::{reconcile_eureka, reconcile_haproxy, reconcile_instances};
