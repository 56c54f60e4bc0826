//! Eureka collector
//!
//! Discovers registry endpoints from servers flagged `is_eureka_node` (their
//! configured `eureka_url`, or the conventional port), then polls each
//! registry's full application list.

use std::sync::Arc;

use futures::{StreamExt, stream};
use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use flotilla_api::eureka::EurekaApplicationsResponse;
use flotilla_common::{DEFAULT_EUREKA_PORT, FlotillaError, Source};
use flotilla_persistence::PersistenceService;
use flotilla_persistence::entity::eureka_server;
use flotilla_persistence::model::SourceBatch;

use crate::client::EurekaClient;
use crate::convert::eureka_applications;
use crate::status::{FetchOutcome, FetchStatusTracker};
use crate::CollectorConfig;

pub struct EurekaCollector {
    store: Arc<dyn PersistenceService>,
    client: EurekaClient,
    tracker: Arc<FetchStatusTracker>,
    config: CollectorConfig,
    batches: mpsc::Sender<SourceBatch>,
}

impl EurekaCollector {
    pub fn new(
        store: Arc<dyn PersistenceService>,
        tracker: Arc<FetchStatusTracker>,
        config: CollectorConfig,
        batches: mpsc::Sender<SourceBatch>,
    ) -> Self {
        let client = EurekaClient::new(config.fetch_timeout);
        Self {
            store,
            client,
            tracker,
            config,
            batches,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let jitter = rand::rng().random_range(0..1000u64);
        tokio::time::sleep(std::time::Duration::from_millis(jitter)).await;

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "eureka collector started"
        );
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("eureka collector shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_cycle().await;
                }
            }
        }
    }

    /// Register registry endpoints for every Eureka node in the inventory
    async fn discover_registries(&self) {
        let nodes = match self.store.server_find_eureka_nodes().await {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!("eureka collector could not snapshot nodes: {:#}", err);
                return;
            }
        };
        for node in nodes {
            let url = node
                .eureka_url
                .clone()
                .unwrap_or_else(|| format!("http://{}:{}/eureka", node.ip, DEFAULT_EUREKA_PORT));
            if let Err(err) = self.store.eureka_server_upsert(Some(node.id), &url).await {
                warn!(server_id = node.id, "failed to register eureka endpoint: {:#}", err);
            }
        }
    }

    async fn poll_cycle(&self) {
        self.discover_registries().await;

        let registries = match self.store.eureka_find_servers().await {
            Ok(registries) => registries,
            Err(err) => {
                warn!("eureka collector could not snapshot registries: {:#}", err);
                return;
            }
        };
        debug!(endpoints = registries.len(), "eureka poll cycle starting");

        let fetches = registries.into_iter().map(|registry| {
            let client = self.client.clone();
            async move {
                let result = client.fetch_applications(&registry.url).await;
                (registry, result)
            }
        });
        let results: Vec<(
            eureka_server::Model,
            Result<EurekaApplicationsResponse, FlotillaError>,
        )> = stream::iter(fetches)
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        for (registry, result) in results {
            match result {
                Ok(response) => {
                    self.tracker
                        .record(Source::Eureka, registry.id, &FetchOutcome::Ok);
                    let batch = SourceBatch::Eureka {
                        eureka_server_id: registry.id,
                        applications: eureka_applications(response),
                    };
                    if self.batches.send(batch).await.is_err() {
                        warn!("observation channel closed, dropping eureka batch");
                    }
                }
                Err(err) => {
                    let outcome = match &err {
                        FlotillaError::NotFound(message) => {
                            FetchOutcome::HardFailure(message.clone())
                        }
                        other => FetchOutcome::SoftFailure(other.to_string()),
                    };
                    let failures = self.tracker.record(Source::Eureka, registry.id, &outcome);
                    debug!(
                        eureka_server_id = registry.id,
                        failures, "eureka fetch failed: {}", err
                    );
                }
            }
        }
    }
}
