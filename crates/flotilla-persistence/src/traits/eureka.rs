//! Eureka topology persistence trait

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::entity::{eureka_application, eureka_instance, eureka_server};
use crate::model::{AppliedEureka, EurekaDelta};

/// Eureka tree storage operations
#[async_trait]
pub trait EurekaPersistence: Send + Sync {
    /// Live registry endpoints
    async fn eureka_find_servers(&self) -> anyhow::Result<Vec<eureka_server::Model>>;

    /// Register or revive a registry endpoint discovered from a Eureka node
    async fn eureka_server_upsert(
        &self,
        server_id: Option<i64>,
        url: &str,
    ) -> anyhow::Result<eureka_server::Model>;

    /// Prior state snapshot for the reconciler, tombstoned rows included
    async fn eureka_find_tree(
        &self,
        eureka_server_id: i64,
    ) -> anyhow::Result<(Vec<eureka_application::Model>, Vec<eureka_instance::Model>)>;

    async fn eureka_instance_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<eureka_instance::Model>>;

    /// Apply one Eureka reconciliation batch in a single transaction
    async fn apply_eureka_delta(
        &self,
        eureka_server_id: i64,
        delta: &EurekaDelta,
        now: NaiveDateTime,
    ) -> anyhow::Result<AppliedEureka>;

    async fn eureka_purge_tombstoned(&self, cutoff: NaiveDateTime) -> anyhow::Result<u64>;
}
