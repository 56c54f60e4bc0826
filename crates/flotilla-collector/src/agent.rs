//! Agent collector
//!
//! Polls every registered server's agent for its instance inventory. Fetch
//! results also drive server reachability: ok flips a server online, a hard
//! failure or crossing the consecutive-failure threshold flips it offline.

use std::sync::Arc;

use futures::{StreamExt, stream};
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use flotilla_api::agent::AgentInventory;
use flotilla_common::{FlotillaError, Source, utils::now_utc};
use flotilla_persistence::PersistenceService;
use flotilla_persistence::entity::server;
use flotilla_persistence::model::{ServerStatus, SourceBatch};

use crate::client::AgentClient;
use crate::convert::instance_observation;
use crate::status::{FetchOutcome, FetchStatusTracker};
use crate::CollectorConfig;

pub struct AgentCollector {
    store: Arc<dyn PersistenceService>,
    client: AgentClient,
    tracker: Arc<FetchStatusTracker>,
    config: CollectorConfig,
    batches: mpsc::Sender<SourceBatch>,
}

impl AgentCollector {
    pub fn new(
        store: Arc<dyn PersistenceService>,
        tracker: Arc<FetchStatusTracker>,
        config: CollectorConfig,
        batches: mpsc::Sender<SourceBatch>,
    ) -> Self {
        let client = AgentClient::new(config.fetch_timeout);
        Self {
            store,
            client,
            tracker,
            config,
            batches,
        }
    }

    /// Run until shutdown. `refresh` carries server ids to poll immediately
    /// (operator-initiated refresh).
    pub async fn run(
        self,
        mut refresh: mpsc::Receiver<i64>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        // Spread collector start so the pollers do not fire in lockstep
        let jitter = rand::rng().random_range(0..1000u64);
        tokio::time::sleep(std::time::Duration::from_millis(jitter)).await;

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "agent collector started"
        );
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("agent collector shutting down");
                    break;
                }
                Some(server_id) = refresh.recv() => {
                    if let Err(err) = self.poll_one(server_id).await {
                        warn!(server_id, "manual refresh failed: {:#}", err);
                    }
                }
                _ = ticker.tick() => {
                    self.poll_cycle().await;
                }
            }
        }
    }

    async fn poll_cycle(&self) {
        let servers = match self.store.server_find_all().await {
            Ok(servers) => servers,
            Err(err) => {
                warn!("agent collector could not snapshot servers: {:#}", err);
                return;
            }
        };
        debug!(endpoints = servers.len(), "agent poll cycle starting");

        let fetches = servers.into_iter().map(|target| {
            let client = self.client.clone();
            async move {
                let result = client.fetch_inventory(&target.ip, target.agent_port).await;
                (target, result)
            }
        });
        let results: Vec<(server::Model, Result<AgentInventory, FlotillaError>)> =
            stream::iter(fetches)
                .buffer_unordered(self.config.concurrency)
                .collect()
                .await;

        for (target, result) in results {
            self.handle_result(target, result).await;
        }
    }

    async fn poll_one(&self, server_id: i64) -> anyhow::Result<()> {
        let Some(target) = self.store.server_find_by_id(server_id).await? else {
            return Err(FlotillaError::NotFound(format!("server {}", server_id)).into());
        };
        let result = self
            .client
            .fetch_inventory(&target.ip, target.agent_port)
            .await;
        self.handle_result(target, result).await;
        Ok(())
    }

    async fn handle_result(
        &self,
        target: server::Model,
        result: Result<AgentInventory, FlotillaError>,
    ) {
        let now = now_utc();
        match result {
            Ok(inventory) => {
                self.tracker.record(Source::Agent, target.id, &FetchOutcome::Ok);
                if let Err(err) = self
                    .store
                    .server_update_reachability(target.id, ServerStatus::Online, now)
                    .await
                {
                    warn!(server_id = target.id, "failed to record reachability: {:#}", err);
                }
                let observed = inventory
                    .instances
                    .into_iter()
                    .map(instance_observation)
                    .collect();
                let batch = SourceBatch::Agent {
                    server_id: target.id,
                    observed,
                };
                // Blocks when the reconciler is behind, slowing polling
                if self.batches.send(batch).await.is_err() {
                    warn!("observation channel closed, dropping agent batch");
                }
            }
            Err(err) => {
                let outcome = match &err {
                    FlotillaError::NotFound(message) => {
                        FetchOutcome::HardFailure(message.clone())
                    }
                    other => FetchOutcome::SoftFailure(other.to_string()),
                };
                let failures = self.tracker.record(Source::Agent, target.id, &outcome);
                let offline = matches!(outcome, FetchOutcome::HardFailure(_))
                    || failures >= self.config.failure_threshold;
                let status = if offline {
                    ServerStatus::Offline
                } else {
                    ServerStatus::parse(&target.status)
                };
                debug!(
                    server_id = target.id,
                    failures,
                    offline,
                    "agent fetch failed: {}",
                    err
                );
                if let Err(err) = self
                    .store
                    .server_update_reachability(target.id, status, now)
                    .await
                {
                    warn!(server_id = target.id, "failed to record reachability: {:#}", err);
                }
            }
        }
    }
}
