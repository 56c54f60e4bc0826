//! Task dispatcher
//!
//! Watches pending tasks and moves them to running, FIFO by creation time,
//! under a global concurrency cap, a per-server cap, and per-instance
//! serialisation: a task touching an instance already in flight waits until
//! that instance frees.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Semaphore, broadcast};
use tracing::{debug, info, warn};

use flotilla_persistence::PersistenceService;
use flotilla_persistence::entity::task;

use crate::cancel::CancelRegistry;
use crate::executor::TaskExecutor;
use crate::params::TaskParams;
use crate::service::OrchestratorConfig;

pub struct TaskDispatcher {
    store: Arc<dyn PersistenceService>,
    executor: Arc<TaskExecutor>,
    cancels: Arc<CancelRegistry>,
    global: Arc<Semaphore>,
    per_server: Arc<DashMap<i64, usize>>,
    in_flight_instances: Arc<DashMap<i64, i64>>,
    per_server_cap: usize,
}

impl TaskDispatcher {
    pub fn new(
        store: Arc<dyn PersistenceService>,
        executor: Arc<TaskExecutor>,
        cancels: Arc<CancelRegistry>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            executor,
            cancels,
            global: Arc::new(Semaphore::new(config.global_concurrency)),
            per_server: Arc::new(DashMap::new()),
            in_flight_instances: Arc::new(DashMap::new()),
            per_server_cap: config.per_server_concurrency,
        }
    }

    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("task dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("task dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.dispatch_pending().await {
                        warn!("dispatch pass failed: {:#}", err);
                    }
                }
            }
        }
    }

    async fn dispatch_pending(self: &Arc<Self>) -> anyhow::Result<()> {
        let pending = self.store.task_find_pending(50).await?;
        for candidate in pending {
            // A cancel issued before dispatch short-circuits the task
            if candidate.cancelled {
                self.store.task_mark_cancelled(candidate.id).await?;
                continue;
            }
            let params = match TaskParams::from_json(&candidate.params) {
                Ok(params) => params,
                Err(err) => {
                    warn!(task_id = candidate.id, "unreadable task params: {:#}", err);
                    if self.store.task_mark_running(candidate.id).await? {
                        self.store
                            .task_mark_failed(candidate.id, "unreadable task params")
                            .await?;
                    }
                    continue;
                }
            };

            if params
                .instance_ids
                .iter()
                .any(|id| self.in_flight_instances.contains_key(id))
            {
                debug!(task_id = candidate.id, "instance busy, task stays pending");
                continue;
            }
            if let Some(server_id) = candidate.server_id {
                let running_here =
                    self.per_server.get(&server_id).map(|c| *c).unwrap_or(0);
                if running_here >= self.per_server_cap {
                    debug!(task_id = candidate.id, server_id, "server at capacity");
                    continue;
                }
            }

            let Ok(permit) = self.global.clone().try_acquire_owned() else {
                break;
            };
            if !self.store.task_mark_running(candidate.id).await? {
                // Raced with a cancel or another dispatcher pass
                drop(permit);
                continue;
            }
            self.spawn_worker(candidate, params, permit);
        }
        Ok(())
    }

    fn spawn_worker(
        self: &Arc<Self>,
        task: task::Model,
        params: TaskParams,
        permit: tokio::sync::OwnedSemaphorePermit,
    ) {
        for instance_id in &params.instance_ids {
            self.in_flight_instances.insert(*instance_id, task.id);
        }
        if let Some(server_id) = task.server_id {
            *self.per_server.entry(server_id).or_insert(0) += 1;
        }
        let cancel = self.cancels.register(task.id);
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let task_id = task.id;
            let server_id = task.server_id;
            dispatcher.executor.execute(task, cancel).await;

            for instance_id in &params.instance_ids {
                dispatcher.in_flight_instances.remove(instance_id);
            }
            if let Some(server_id) = server_id {
                if let Some(mut count) = dispatcher.per_server.get_mut(&server_id) {
                    *count = count.saturating_sub(1);
                }
            }
            dispatcher.cancels.remove(task_id);
            drop(permit);
        });
    }
}
