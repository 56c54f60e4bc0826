//! Periodic purge pass
//!
//! Hard-deletes rows whose tombstone is older than the configured retention,
//! skipping rows still referenced by a mapping, and trims per-instance event
//! logs to the retention count. Runs well apart from the reconciliation
//! cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info};

use flotilla_common::utils::now_utc;
use flotilla_persistence::PersistenceService;

pub struct PurgeService {
    store: Arc<dyn PersistenceService>,
    retention: chrono::Duration,
    interval: Duration,
    event_retention: u64,
}

impl PurgeService {
    pub fn new(
        store: Arc<dyn PersistenceService>,
        retention_days: i64,
        interval: Duration,
        event_retention: u64,
    ) -> Self {
        Self {
            store,
            retention: chrono::Duration::days(retention_days),
            interval,
            event_retention,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.retention.num_days(),
            "purge service started"
        );
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("purge service shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.purge_once().await {
                        error!("purge pass failed: {:#}", err);
                    }
                }
            }
        }
    }

    async fn purge_once(&self) -> anyhow::Result<()> {
        let cutoff = now_utc() - self.retention;
        let instances = self.store.instance_purge_tombstoned(cutoff).await?;
        let haproxy = self.store.haproxy_purge_tombstoned(cutoff).await?;
        let eureka = self.store.eureka_purge_tombstoned(cutoff).await?;
        let events = self.store.event_trim_all(self.event_retention).await?;
        if instances + haproxy + eureka + events > 0 {
            info!(instances, haproxy, eureka, events, "purged expired rows");
        }
        Ok(())
    }
}
