//! HAProxy collector
//!
//! Polls the HAProxy block of agents on servers flagged `is_haproxy_node`.
//! Reachability of the host itself is the agent collector's concern; this
//! collector only records its own fetch-status and ships topology batches.

use std::sync::Arc;

use futures::{StreamExt, stream};
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use flotilla_api::agent::AgentHaproxyReport;
use flotilla_common::{FlotillaError, Source};
use flotilla_persistence::PersistenceService;
use flotilla_persistence::entity::server;
use flotilla_persistence::model::SourceBatch;

use crate::client::AgentClient;
use crate::convert::haproxy_processes;
use crate::status::{FetchOutcome, FetchStatusTracker};
use crate::CollectorConfig;

pub struct HaproxyCollector {
    store: Arc<dyn PersistenceService>,
    client: AgentClient,
    tracker: Arc<FetchStatusTracker>,
    config: CollectorConfig,
    batches: mpsc::Sender<SourceBatch>,
}

impl HaproxyCollector {
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

    /// Run until shutdown. `sync` carries server ids whose HAProxy view
    /// should be refreshed immediately (operator-initiated sync).
    pub async fn run(
        self,
        mut sync: mpsc::Receiver<i64>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let jitter = rand::rng().random_range(0..1000u64);
        tokio::time::sleep(std::time::Duration::from_millis(jitter)).await;

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "haproxy collector started"
        );
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("haproxy collector shutting down");
                    break;
                }
                Some(server_id) = sync.recv() => {
                    if let Err(err) = self.poll_one(server_id).await {
                        warn!(server_id, "manual haproxy sync failed: {:#}", err);
                    }
                }
                _ = ticker.tick() => {
                    self.poll_cycle().await;
                }
            }
        }
    }

    async fn poll_cycle(&self) {
        let nodes = match self.store.server_find_haproxy_nodes().await {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!("haproxy collector could not snapshot nodes: {:#}", err);
                return;
            }
        };
        debug!(endpoints = nodes.len(), "haproxy poll cycle starting");

        let fetches = nodes.into_iter().map(|target| {
            let client = self.client.clone();
            async move {
                let result = client.fetch_haproxy(&target.ip, target.agent_port).await;
                (target, result)
            }
        });
        let results: Vec<(server::Model, Result<AgentHaproxyReport, FlotillaError>)> =
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
            .fetch_haproxy(&target.ip, target.agent_port)
            .await;
        self.handle_result(target, result).await;
        Ok(())
    }

    async fn handle_result(
        &self,
        target: server::Model,
        result: Result<AgentHaproxyReport, FlotillaError>,
    ) {
        match result {
            Ok(report) => {
                self.tracker
                    .record(Source::Haproxy, target.id, &FetchOutcome::Ok);
                let batch = SourceBatch::Haproxy {
                    server_id: target.id,
                    processes: haproxy_processes(report),
                };
                if self.batches.send(batch).await.is_err() {
                    warn!("observation channel closed, dropping haproxy batch");
                }
            }
            Err(err) => {
                let outcome = match &err {
                    FlotillaError::NotFound(message) => {
                        FetchOutcome::HardFailure(message.clone())
                    }
                    other => FetchOutcome::SoftFailure(other.to_string()),
                };
                let failures = self.tracker.record(Source::Haproxy, target.id, &outcome);
                debug!(
                    server_id = target.id,
                    failures, "haproxy fetch failed: {}", err
                );
            }
        }
    }
}
