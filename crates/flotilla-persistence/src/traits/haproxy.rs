//! HAProxy topology persistence trait

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::entity::{haproxy_backend, haproxy_instance, haproxy_server};
use crate::model::{AppliedHaproxy, BackendSummary, HaproxyDelta};

/// HAProxy tree storage operations
#[async_trait]
pub trait HaproxyPersistence: Send + Sync {
    /// Live HAProxy processes across the fleet
    async fn haproxy_list_instances(&self) -> anyhow::Result<Vec<haproxy_instance::Model>>;

    /// Live backends of one HAProxy process with per-status member counts
    async fn haproxy_backends_with_counts(
        &self,
        haproxy_instance_id: i64,
    ) -> anyhow::Result<Vec<BackendSummary>>;

    /// Live members of one backend
    async fn haproxy_servers_for_backend(
        &self,
        backend_id: i64,
    ) -> anyhow::Result<Vec<haproxy_server::Model>>;

    async fn haproxy_server_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<haproxy_server::Model>>;

    async fn haproxy_backend_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<haproxy_backend::Model>>;

    async fn haproxy_instance_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<haproxy_instance::Model>>;

    /// Prior state snapshot for the reconciler: all processes of one server
    /// with their backends and members, tombstoned rows included.
    async fn haproxy_find_tree_by_server(
        &self,
        server_id: i64,
    ) -> anyhow::Result<(
        Vec<haproxy_instance::Model>,
        Vec<haproxy_backend::Model>,
        Vec<haproxy_server::Model>,
    )>;

    /// Apply one HAProxy reconciliation batch in a single transaction
    async fn apply_haproxy_delta(
        &self,
        server_id: i64,
        delta: &HaproxyDelta,
        now: NaiveDateTime,
    ) -> anyhow::Result<AppliedHaproxy>;

    /// Current sessions (scur) of one member, as last observed
    async fn haproxy_server_sessions(&self, id: i64) -> anyhow::Result<Option<i64>>;

    async fn haproxy_purge_tombstoned(&self, cutoff: NaiveDateTime) -> anyhow::Result<u64>;
}
