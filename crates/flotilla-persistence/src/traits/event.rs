//! Event and append-only history persistence trait

use async_trait::async_trait;

use crate::entity::{event, version_history};

/// Event log and version history operations
#[async_trait]
pub trait EventPersistence: Send + Sync {
    /// Append an event and trim the instance's log to `retention` rows
    async fn event_append(
        &self,
        instance_id: i64,
        event_type: &str,
        message: Option<&str>,
        retention: u64,
    ) -> anyhow::Result<()>;

    async fn events_recent(
        &self,
        instance_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<event::Model>>;

    async fn version_history_append(
        &self,
        instance_id: i64,
        old_version: Option<&str>,
        new_version: Option<&str>,
        changed_by: Option<&str>,
        reason: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn version_history_recent(
        &self,
        instance_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<version_history::Model>>;

    /// Trim every instance's event log to `retention` rows. Used by the
    /// periodic purge pass; returns the number of deleted rows.
    async fn event_trim_all(&self, retention: u64) -> anyhow::Result<u64>;
}
