//! Task persistence trait
//!
//! Status mutations are conditional updates guarding the monotone lifecycle;
//! a mutation that would move a task backwards returns false and persists
//! nothing.

use async_trait::async_trait;

use crate::entity::task;
use crate::model::{NewTask, TaskFilter};

/// Task storage operations
#[async_trait]
pub trait TaskPersistence: Send + Sync {
    /// Create all tasks of one submission
    async fn task_create_batch(&self, tasks: &[NewTask]) -> anyhow::Result<Vec<i64>>;

    async fn task_find_by_id(&self, id: i64) -> anyhow::Result<Option<task::Model>>;

    async fn task_query(&self, filter: &TaskFilter) -> anyhow::Result<Vec<task::Model>>;

    /// Pending tasks, FIFO by creation time
    async fn task_find_pending(&self, limit: u64) -> anyhow::Result<Vec<task::Model>>;

    /// Tasks previously created under an idempotency key
    async fn task_find_by_idempotency_key(
        &self,
        key: &str,
    ) -> anyhow::Result<Vec<task::Model>>;

    /// pending -> running; refuses cancelled or already-started tasks
    async fn task_mark_running(&self, id: i64) -> anyhow::Result<bool>;

    /// running -> completed
    async fn task_mark_completed(&self, id: i64, result: Option<&str>) -> anyhow::Result<bool>;

    /// running -> failed
    async fn task_mark_failed(&self, id: i64, error: &str) -> anyhow::Result<bool>;

    /// pending|running -> cancelled
    async fn task_mark_cancelled(&self, id: i64) -> anyhow::Result<bool>;

    /// Set the cooperative cancel flag, returning the current row
    async fn task_set_cancel_flag(&self, id: i64) -> anyhow::Result<Option<task::Model>>;

    /// Replace the progress JSON; only running tasks accept progress
    async fn task_update_progress(&self, id: i64, progress: &str) -> anyhow::Result<bool>;

    async fn task_set_runner_pid(&self, id: i64, pid: Option<i64>) -> anyhow::Result<bool>;
}
