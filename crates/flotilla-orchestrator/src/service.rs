//! Orchestrator public operations: submit, cancel
//!
//! Submissions validate targets, partition them by batch grouping strategy,
//! and persist one pending task per partition. Resubmitting with the same
//! idempotency key returns the originally created task ids.

use std::sync::Arc;

use tracing::info;

use flotilla_api::operator::{BatchAction, BatchUpdateRequest, TargetOutcome, UpdateMode};
use flotilla_common::FlotillaError;
use flotilla_persistence::PersistenceService;
use flotilla_persistence::model::{NewTask, TaskStatus, TaskType};

use crate::cancel::CancelRegistry;
use crate::params::TaskParams;
use crate::planner::plan;
use crate::progress::ProgressRouter;
use crate::runner::PlaybookRunner;

/// Orchestrator settings, from the enumerated configuration
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub global_concurrency: usize,
    pub per_server_concurrency: usize,
    pub drain_wait_max_minutes: u32,
    /// Runner program plus fixed arguments
    pub runner_command: Vec<String>,
    /// Base URL the runner posts progress callbacks to
    pub callback_base_url: String,
    pub event_retention: u64,
}

#[derive(Clone, Debug)]
pub struct SubmitOutcome {
    pub task_ids: Vec<i64>,
    pub groups_count: usize,
    pub results: Vec<TargetOutcome>,
}

pub struct Orchestrator {
    store: Arc<dyn PersistenceService>,
    cancels: Arc<CancelRegistry>,
    progress: Arc<ProgressRouter>,
    config: Arc<OrchestratorConfig>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn PersistenceService>,
        cancels: Arc<CancelRegistry>,
        progress: Arc<ProgressRouter>,
        config: Arc<OrchestratorConfig>,
    ) -> Self {
        Self {
            store,
            cancels,
            progress,
            config,
        }
    }

    pub fn progress_router(&self) -> Arc<ProgressRouter> {
        Arc::clone(&self.progress)
    }

    pub fn config(&self) -> Arc<OrchestratorConfig> {
        Arc::clone(&self.config)
    }

    /// Submit a start/stop/restart over a set of instances
    pub async fn submit_action(
        &self,
        action: BatchAction,
        app_ids: &[i64],
        idempotency_key: Option<String>,
        actor: &str,
    ) -> anyhow::Result<SubmitOutcome> {
        let kind = match action {
            BatchAction::Start => TaskType::Start,
            BatchAction::Stop => TaskType::Stop,
            BatchAction::Restart => TaskType::Restart,
        };
        self.submit(kind, app_ids, idempotency_key, |instance_ids| {
            TaskParams::action_only(kind, instance_ids, Some(actor.to_string()))
        })
        .await
    }

    /// Submit a rolling update over a set of instances
    pub async fn submit_update(
        &self,
        request: &BatchUpdateRequest,
        actor: &str,
    ) -> anyhow::Result<SubmitOutcome> {
        let drain_wait = request.drain_wait_time.unwrap_or(0);
        if drain_wait > 60 || drain_wait > self.config.drain_wait_max_minutes {
            return Err(FlotillaError::PreconditionFailed(format!(
                "drain_wait_time {} exceeds the allowed maximum",
                drain_wait
            ))
            .into());
        }
        if request.distr_url.is_empty() {
            return Err(FlotillaError::PreconditionFailed("distr_url is required".into()).into());
        }
        let distr_url = request.distr_url.clone();
        let mode = request.mode;
        let orchestrator_playbook = request.orchestrator_playbook.clone();
        let drains = mode == UpdateMode::Immediate;
        let drain_wait_minutes = if drains { drain_wait } else { 0 };
        self.submit(
            TaskType::Update,
            &request.app_ids,
            request.idempotency_key.clone(),
            move |instance_ids| TaskParams {
                action: TaskType::Update,
                instance_ids,
                distr_url: Some(distr_url.clone()),
                mode: Some(mode),
                orchestrator_playbook: orchestrator_playbook.clone(),
                drain_wait_minutes,
                actor: Some(actor.to_string()),
            },
        )
        .await
    }

    async fn submit(
        &self,
        kind: TaskType,
        app_ids: &[i64],
        idempotency_key: Option<String>,
        build_params: impl Fn(Vec<i64>) -> TaskParams,
    ) -> anyhow::Result<SubmitOutcome> {
        if let Some(key) = idempotency_key.as_deref() {
            let existing = self.store.task_find_by_idempotency_key(key).await?;
            if !existing.is_empty() {
                info!(key, "idempotent resubmission, returning existing tasks");
                return Ok(SubmitOutcome {
                    task_ids: existing.iter().map(|t| t.id).collect(),
                    groups_count: existing.len(),
                    results: Vec::new(),
                });
            }
        }

        let targets = self.store.instance_find_plan_targets(app_ids).await?;
        let mut results: Vec<TargetOutcome> = app_ids
            .iter()
            .filter(|id| !targets.iter().any(|t| t.id == **id))
            .map(|id| TargetOutcome::rejected(*id, "not_found"))
            .collect();

        let planned = plan(kind, &targets);
        results.extend(planned.rejected.clone());
        for partition in &planned.partitions {
            for instance_id in &partition.instance_ids {
                results.push(TargetOutcome::accepted(*instance_id));
            }
        }

        let new_tasks: Vec<NewTask> = planned
            .partitions
            .iter()
            .map(|partition| NewTask {
                task_type: kind,
                params: build_params(partition.instance_ids.clone()).to_json(),
                server_id: partition.server_id,
                instance_id: partition.instance_id,
                idempotency_key: idempotency_key.clone(),
            })
            .collect();
        let task_ids = if new_tasks.is_empty() {
            Vec::new()
        } else {
            self.store.task_create_batch(&new_tasks).await?
        };
        info!(
            kind = kind.as_str(),
            submitted = app_ids.len(),
            tasks = task_ids.len(),
            rejected = results.iter().filter(|r| !r.accepted).count(),
            "submission expanded into tasks"
        );
        Ok(SubmitOutcome {
            task_ids,
            groups_count: planned.partitions.len(),
            results,
        })
    }

    /// Cooperative cancel: flags the row, wakes the executor's token, and
    /// falls back to signalling the runner PID when no executor owns the
    /// task in this process.
    pub async fn cancel(&self, task_id: i64) -> anyhow::Result<bool> {
        let Some(task) = self.store.task_find_by_id(task_id).await? else {
            return Err(FlotillaError::NotFound(format!("task {}", task_id)).into());
        };
        let status: TaskStatus = task
            .status
            .parse()
            .map_err(FlotillaError::Internal)?;
        match status {
            TaskStatus::Pending => {
                self.store.task_set_cancel_flag(task_id).await?;
                self.store.task_mark_cancelled(task_id).await?;
                Ok(true)
            }
            TaskStatus::Running => {
                self.store.task_set_cancel_flag(task_id).await?;
                let signalled = self.cancels.cancel(task_id);
                if !signalled {
                    if let Some(pid) = task.runner_pid {
                        PlaybookRunner::kill_pid(pid);
                    }
                    self.store.task_mark_cancelled(task_id).await?;
                }
                Ok(true)
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => Ok(false),
        }
    }
}
