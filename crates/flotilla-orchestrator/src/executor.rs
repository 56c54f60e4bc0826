//! Task execution
//!
//! Drives one running task through its phases: pre-drain (immediate updates
//! only), playbook invocation, progress streaming, and the final status
//! write. Failure of any sub-step halts the rest of the task; sibling tasks
//! are unaffected.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use flotilla_api::operator::UpdateMode;
use flotilla_api::progress::{RunnerCompletion, TaskPhase, TaskProgress};
use flotilla_common::FlotillaError;
use flotilla_persistence::PersistenceService;
use flotilla_persistence::entity::{app_instance, task};
use flotilla_persistence::model::{MappingEntityType, TaskType};

use crate::cancel::CancelToken;
use crate::drain::{DrainOutcome, SessionSource, wait_for_drain};
use crate::params::TaskParams;
use crate::progress::{ProgressRouter, RunnerMessage};
use crate::runner::{HaproxyTarget, PlaybookRunner, RunnerBundle, RunnerInstance};
use crate::service::OrchestratorConfig;

/// Adapter exposing the store's last-observed `scur` to the drain loop
struct StoreSessions(Arc<dyn PersistenceService>);

#[async_trait]
impl SessionSource for StoreSessions {
    async fn current_sessions(&self, haproxy_server_id: i64) -> anyhow::Result<Option<i64>> {
        self.0.haproxy_server_sessions(haproxy_server_id).await
    }
}

enum ExecOutcome {
    Completed { result: String },
    Cancelled,
}

pub struct TaskExecutor {
    store: Arc<dyn PersistenceService>,
    progress: Arc<ProgressRouter>,
    runner: PlaybookRunner,
    config: Arc<OrchestratorConfig>,
}

impl TaskExecutor {
    pub fn new(
        store: Arc<dyn PersistenceService>,
        progress: Arc<ProgressRouter>,
        config: Arc<OrchestratorConfig>,
    ) -> Self {
        let runner = PlaybookRunner::new(config.runner_command.clone());
        Self {
            store,
            progress,
            runner,
            config,
        }
    }

    /// Execute one running task to a terminal status
    pub async fn execute(&self, task: task::Model, cancel: CancelToken) {
        let task_id = task.id;
        let outcome = self.run(&task, &cancel).await;
        // No progress events are accepted after this point
        self.progress.unregister(task_id);

        match outcome {
            Ok(ExecOutcome::Completed { result }) => {
                if let Err(err) = self.store.task_mark_completed(task_id, Some(&result)).await {
                    warn!(task_id, "failed to persist completion: {:#}", err);
                }
                info!(task_id, "task completed");
            }
            Ok(ExecOutcome::Cancelled) => {
                if let Err(err) = self.store.task_mark_cancelled(task_id).await {
                    warn!(task_id, "failed to persist cancellation: {:#}", err);
                }
                info!(task_id, "task cancelled");
            }
            Err(err) => {
                let typed = FlotillaError::from_anyhow(err);
                if matches!(typed, FlotillaError::Cancelled) {
                    if let Err(err) = self.store.task_mark_cancelled(task_id).await {
                        warn!(task_id, "failed to persist cancellation: {:#}", err);
                    }
                    return;
                }
                let message = typed.to_string();
                warn!(task_id, "task failed: {}", message);
                if let Err(err) = self.store.task_mark_failed(task_id, &message).await {
                    warn!(task_id, "failed to persist failure: {:#}", err);
                }
            }
        }
    }

    async fn run(&self, task: &task::Model, cancel: &CancelToken) -> anyhow::Result<ExecOutcome> {
        let params = TaskParams::from_json(&task.params)?;
        let instances = self.store.instance_find_by_ids(&params.instance_ids).await?;
        if instances.is_empty() {
            return Err(FlotillaError::NotFound("no live targets remain".into()).into());
        }

        let runner_instances = self.runner_instances(&instances).await?;

        if params.drains() {
            match self.drain_phase(task, &params, &instances, cancel).await? {
                DrainOutcome::Cancelled => return Ok(ExecOutcome::Cancelled),
                outcome => debug!(task_id = task.id, ?outcome, "drain phase finished"),
            }
        }

        let completion = self
            .invoke_runner(task, &params, &runner_instances, cancel)
            .await?;
        let completion = match completion {
            Some(completion) => completion,
            None => return Ok(ExecOutcome::Cancelled),
        };

        if !completion.success {
            let error = completion
                .error
                .unwrap_or_else(|| "runner reported failure".to_string());
            return Err(FlotillaError::Internal(error).into());
        }

        self.post_success(&params, &instances, completion.version.as_deref())
            .await?;
        Ok(ExecOutcome::Completed {
            result: "ok".to_string(),
        })
    }

    async fn runner_instances(
        &self,
        instances: &[app_instance::Model],
    ) -> anyhow::Result<Vec<RunnerInstance>> {
        let mut out = Vec::with_capacity(instances.len());
        for instance in instances {
            let server = self
                .store
                .server_find_by_id(instance.server_id)
                .await?
                .ok_or_else(|| {
                    FlotillaError::NotFound(format!("server {}", instance.server_id))
                })?;
            out.push(RunnerInstance {
                instance_id: instance.id,
                instance_name: instance.instance_name.clone(),
                app_type: instance.app_type.clone(),
                server_name: server.name,
                server_ip: server.ip,
            });
        }
        Ok(out)
    }

    /// Mark every auto-mapped live HAProxy member DRAIN and wait for its
    /// sessions to quiesce, within one shared deadline.
    async fn drain_phase(
        &self,
        task: &task::Model,
        params: &TaskParams,
        instances: &[app_instance::Model],
        cancel: &CancelToken,
    ) -> anyhow::Result<DrainOutcome> {
        let budget = Duration::from_secs(60 * u64::from(params.drain_wait_minutes));
        let deadline = tokio::time::Instant::now() + budget;
        let sessions = StoreSessions(self.store.clone());

        for instance in instances {
            let mappings = self.store.mapping_find_for_application(instance.id).await?;
            for mapping in mappings.into_iter().filter(|m| {
                !m.is_manual && m.entity_type == MappingEntityType::HaproxyServer.as_str()
            }) {
                let Some(member) = self
                    .store
                    .haproxy_server_find_by_id(mapping.entity_id)
                    .await?
                else {
                    continue;
                };
                if !member.is_live() {
                    continue;
                }
                let (backend, server_name) = self.drain_target_names(member.backend_id).await?;
                let correlation_id = uuid::Uuid::new_v4().to_string();
                let drain_bundle = RunnerBundle {
                    task_id: task.id,
                    correlation_id: &correlation_id,
                    action: "drain",
                    playbook: None,
                    instances: &[],
                    distr_url: None,
                    mode: None,
                    drain_wait_minutes: params.drain_wait_minutes,
                    callback_url: None,
                    haproxy_target: Some(HaproxyTarget {
                        server_name: &server_name,
                        backend: &backend,
                        member: &member.name,
                    }),
                };
                if !self.runner.run_to_completion(&drain_bundle).await? {
                    return Err(FlotillaError::RemoteUnavailable(format!(
                        "drain command failed for member {}",
                        member.name
                    ))
                    .into());
                }

                let remaining_budget =
                    deadline.saturating_duration_since(tokio::time::Instant::now());
                let (tx, mut rx) = mpsc::unbounded_channel::<i64>();
                let store = self.store.clone();
                let task_id = task.id;
                let writer = tokio::spawn(async move {
                    while let Some(sessions_remaining) = rx.recv().await {
                        let progress = TaskProgress::draining(sessions_remaining);
                        let json = serde_json::to_string(&progress)
                            .expect("progress is always serializable");
                        if let Err(err) = store.task_update_progress(task_id, &json).await {
                            warn!(task_id, "failed to write drain progress: {:#}", err);
                        }
                    }
                });
                let outcome = wait_for_drain(&sessions, member.id, remaining_budget, cancel, |n| {
                    let _ = tx.send(n);
                })
                .await;
                drop(tx);
                let _ = writer.await;
                match outcome? {
                    DrainOutcome::Cancelled => return Ok(DrainOutcome::Cancelled),
                    DrainOutcome::DeadlineElapsed => return Ok(DrainOutcome::DeadlineElapsed),
                    DrainOutcome::Drained => {}
                }
            }
        }
        Ok(DrainOutcome::Drained)
    }

    /// Backend name and HAProxy host name for the drain command
    async fn drain_target_names(&self, backend_id: i64) -> anyhow::Result<(String, String)> {
        let backend = self
            .store
            .haproxy_backend_find_by_id(backend_id)
            .await?
            .ok_or_else(|| FlotillaError::NotFound(format!("haproxy backend {}", backend_id)))?;
        let process = self
            .store
            .haproxy_instance_find_by_id(backend.haproxy_instance_id)
            .await?
            .ok_or_else(|| {
                FlotillaError::NotFound(format!(
                    "haproxy instance {}",
                    backend.haproxy_instance_id
                ))
            })?;
        let host = self
            .store
            .server_find_by_id(process.server_id)
            .await?
            .ok_or_else(|| FlotillaError::NotFound(format!("server {}", process.server_id)))?;
        Ok((backend.name, host.name))
    }

    /// Spawn the playbook and stream progress until completion, child exit,
    /// or cancellation. Returns None when cancelled.
    async fn invoke_runner(
        &self,
        task: &task::Model,
        params: &TaskParams,
        instances: &[RunnerInstance],
        cancel: &CancelToken,
    ) -> anyhow::Result<Option<RunnerCompletion>> {
        let playbook = self.resolve_playbook(params).await?;
        let callback_url = format!(
            "{}/internal/tasks/{}/progress",
            self.config.callback_base_url.trim_end_matches('/'),
            task.id
        );
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let mode = params.mode.map(|m| m.as_str());
        let bundle = RunnerBundle {
            task_id: task.id,
            correlation_id: &correlation_id,
            action: params.action.as_str(),
            playbook: playbook.as_deref(),
            instances,
            distr_url: params.distr_url.as_deref(),
            mode,
            drain_wait_minutes: params.drain_wait_minutes,
            callback_url: Some(&callback_url),
            haproxy_target: None,
        };

        let mut events = self.progress.register(task.id);
        let mut handle = self.runner.spawn(&bundle).await?;
        self.store
            .task_set_runner_pid(task.id, handle.pid.map(i64::from))
            .await?;

        let mut ticker = tokio::time::interval(Duration::from_millis(500));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = handle.child.start_kill();
                    return Ok(None);
                }
                message = events.recv() => {
                    match message {
                        Some(RunnerMessage::Progress(event)) => {
                            self.apply_progress(task.id, &event.phase, event.percent, event.host, event.message).await;
                        }
                        Some(RunnerMessage::Complete(completion)) => {
                            return Ok(Some(completion));
                        }
                        None => {
                            return Err(FlotillaError::Internal(
                                "progress channel closed unexpectedly".into(),
                            )
                            .into());
                        }
                    }
                }
                _ = ticker.tick() => {
                    if let Some(status) = handle.child.try_wait()? {
                        // Completion may already be queued behind the exit
                        while let Ok(message) = events.try_recv() {
                            match message {
                                RunnerMessage::Complete(completion) => {
                                    return Ok(Some(completion));
                                }
                                RunnerMessage::Progress(event) => {
                                    self.apply_progress(task.id, &event.phase, event.percent, event.host, event.message).await;
                                }
                            }
                        }
                        return Err(FlotillaError::Internal(format!(
                            "runner exited ({}) without posting completion",
                            status
                        ))
                        .into());
                    }
                }
            }
        }
    }

    async fn apply_progress(
        &self,
        task_id: i64,
        phase: &str,
        percent: Option<u8>,
        host: Option<String>,
        message: Option<String>,
    ) {
        let Some(phase) = TaskPhase::from_runner_label(phase) else {
            // Unknown kinds are rejected at the boundary
            warn!(task_id, phase, "rejected progress event with unknown phase");
            return;
        };
        let progress = TaskProgress {
            phase,
            percent,
            host,
            message,
        };
        let json = serde_json::to_string(&progress).expect("progress is always serializable");
        if let Err(err) = self.store.task_update_progress(task_id, &json).await {
            warn!(task_id, "failed to write progress: {:#}", err);
        }
    }

    /// Playbook priority: explicit submission override, then the group's
    /// update playbook, then the instance custom playbook, then the catalog
    /// default.
    async fn resolve_playbook(&self, params: &TaskParams) -> anyhow::Result<Option<String>> {
        if params.orchestrator_playbook.is_some() {
            return Ok(params.orchestrator_playbook.clone());
        }
        let Some(first_id) = params.instance_ids.first() else {
            return Ok(None);
        };
        let Some(instance) = self.store.instance_find_by_id(*first_id).await? else {
            return Ok(None);
        };
        if let Some(group_id) = instance.group_id {
            if let Some(group) = self.store.group_find_by_id(group_id).await? {
                if group.update_playbook.is_some() {
                    return Ok(group.update_playbook);
                }
            }
        }
        if instance.custom_playbook.is_some() {
            return Ok(instance.custom_playbook);
        }
        if let Some(catalog_id) = instance.catalog_id {
            if let Some(catalog) = self.store.catalog_find_by_id(catalog_id).await? {
                return Ok(catalog.default_playbook);
            }
        }
        Ok(None)
    }

    async fn post_success(
        &self,
        params: &TaskParams,
        instances: &[app_instance::Model],
        new_version: Option<&str>,
    ) -> anyhow::Result<()> {
        let actor = params.actor.as_deref().unwrap_or("orchestrator");
        for instance in instances {
            if params.action == TaskType::Update {
                if let Some(new_version) = new_version {
                    if instance.version.as_deref() != Some(new_version) {
                        self.store
                            .version_history_append(
                                instance.id,
                                instance.version.as_deref(),
                                Some(new_version),
                                Some(actor),
                                Some(params.mode.map(|m| m.as_str()).unwrap_or("update")),
                            )
                            .await?;
                    }
                }
            }
            let event_type = match (params.action, params.mode) {
                (TaskType::Update, Some(UpdateMode::Deliver | UpdateMode::NightRestart)) => {
                    "update_delivered"
                }
                _ => "task_completed",
            };
            self.store
                .event_append(
                    instance.id,
                    event_type,
                    Some(&format!("{} by {}", params.action.as_str(), actor)),
                    self.config.event_retention,
                )
                .await?;
        }
        Ok(())
    }
}
