//! Application instance persistence trait

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::entity::app_instance;
use crate::model::{
    AppliedInstances, InstanceDelta, InstanceDetail, InstanceSearchFilter, MappingCandidate,
    PlanTarget,
};

/// Application instance storage operations
#[async_trait]
pub trait InstancePersistence: Send + Sync {
    /// Search live instances with filters; free text matches instance name,
    /// app type, and version. Tag filtering includes inherited group tags.
    async fn instance_search(
        &self,
        filter: &InstanceSearchFilter,
    ) -> anyhow::Result<Vec<app_instance::Model>>;

    async fn instance_find_by_id(&self, id: i64) -> anyhow::Result<Option<app_instance::Model>>;

    async fn instance_find_by_ids(
        &self,
        ids: &[i64],
    ) -> anyhow::Result<Vec<app_instance::Model>>;

    /// Instance with tags, inherited group tags, mappings, and recent events
    async fn instance_detail(
        &self,
        id: i64,
        event_limit: u64,
    ) -> anyhow::Result<Option<InstanceDetail>>;

    /// All rows for one server, tombstoned included - the reconciler's prior
    /// state snapshot.
    async fn instance_find_by_server(
        &self,
        server_id: i64,
    ) -> anyhow::Result<Vec<app_instance::Model>>;

    /// Live instances on servers with the given IP, as mapping candidates
    async fn instance_find_candidates_by_ip(
        &self,
        ip: &str,
    ) -> anyhow::Result<Vec<MappingCandidate>>;

    /// Set or clear the custom update playbook override
    async fn instance_update_playbook(
        &self,
        id: i64,
        playbook: Option<&str>,
    ) -> anyhow::Result<bool>;

    /// Apply one agent reconciliation batch in a single transaction
    async fn apply_instance_delta(
        &self,
        server_id: i64,
        delta: &InstanceDelta,
        now: NaiveDateTime,
    ) -> anyhow::Result<AppliedInstances>;

    /// Load validation/partitioning data for the task planner
    async fn instance_find_plan_targets(&self, ids: &[i64]) -> anyhow::Result<Vec<PlanTarget>>;

    /// Hard-delete rows tombstoned before `cutoff` unless still referenced by
    /// a mapping. Returns the number of purged rows.
    async fn instance_purge_tombstoned(&self, cutoff: NaiveDateTime) -> anyhow::Result<u64>;
}
