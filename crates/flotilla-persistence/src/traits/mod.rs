//! Persistence trait abstractions
//!
//! One trait per concern; `PersistenceService` aggregates them all. The SQL
//! backend implements every trait against a SeaORM connection.

use async_trait::async_trait;

mod catalog;
mod eureka;
mod event;
mod haproxy;
mod instance;
mod mapping;
mod server;
mod tag;
mod task;

pub use catalog::{CatalogPersistence, GroupPersistence};
pub use eureka::EurekaPersistence;
pub use event::EventPersistence;
pub use haproxy::HaproxyPersistence;
pub use instance::InstancePersistence;
pub use mapping::MappingPersistence;
pub use server::ServerPersistence;
pub use tag::TagPersistence;
pub use task::TaskPersistence;

/// Unified persistence service
#[async_trait]
pub trait PersistenceService:
    ServerPersistence
    + CatalogPersistence
    + GroupPersistence
    + InstancePersistence
    + TagPersistence
    + HaproxyPersistence
    + EurekaPersistence
    + MappingPersistence
    + TaskPersistence
    + EventPersistence
    + Send
    + Sync
{
    /// Verify database connectivity
    async fn health_check(&self) -> anyhow::Result<()>;
}
