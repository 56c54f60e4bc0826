//! Reconcile driver
//!
//! Consumes collector batches from a bounded channel, one source at a time:
//! loads the prior rows, computes the pure delta, applies it in a single
//! transaction, then dispatches the mapping engine for newly appeared
//! entities and endpoint changes. Backpressure on the channel naturally
//! slows the collectors when reconciliation falls behind.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use flotilla_common::utils::now_utc;
use flotilla_persistence::PersistenceService;
use flotilla_persistence::model::SourceBatch;

use crate::mapping::MappingService;
use crate::reconciler::{reconcile_eureka, reconcile_haproxy, reconcile_instances};

/// Single consumer applying observation batches to the store
pub struct ReconcileDriver {
    store: Arc<dyn PersistenceService>,
    mapping: Arc<MappingService>,
}

impl ReconcileDriver {
    pub fn new(store: Arc<dyn PersistenceService>, mapping: Arc<MappingService>) -> Self {
        Self { store, mapping }
    }

    /// Run until the channel closes or shutdown is signalled. In-flight
    /// batch application always finishes; the store never sees a partial
    /// batch.
    pub async fn run(
        self,
        mut batches: mpsc::Receiver<SourceBatch>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("reconcile driver started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("reconcile driver shutting down");
                    break;
                }
                batch = batches.recv() => {
                    match batch {
                        None => {
                            info!("observation channel closed, reconcile driver exiting");
                            break;
                        }
                        Some(batch) => {
                            if let Err(err) = self.process(batch).await {
                                error!("failed to apply observation batch: {:#}", err);
                            }
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, batch: SourceBatch) -> anyhow::Result<()> {
        let now = now_utc();
        match batch {
            SourceBatch::Agent {
                server_id,
                observed,
            } => {
                let prior = self.store.instance_find_by_server(server_id).await?;
                let delta = reconcile_instances(&prior, &observed);
                for warning in &delta.warnings {
                    warn!(server_id, "{}", warning);
                }
                let applied = self.store.apply_instance_delta(server_id, &delta, now).await?;
                debug!(
                    server_id,
                    created = applied.created_ids.len(),
                    tombstoned = applied.tombstoned_ids.len(),
                    "applied agent batch"
                );
                for id in applied.endpoint_changed_ids {
                    self.mapping.handle_instance_endpoint_changed(id).await?;
                }
            }
            SourceBatch::Haproxy {
                server_id,
                processes,
            } => {
                let (prior_processes, prior_backends, prior_servers) =
                    self.store.haproxy_find_tree_by_server(server_id).await?;
                let delta = reconcile_haproxy(
                    &prior_processes,
                    &prior_backends,
                    &prior_servers,
                    &processes,
                );
                for warning in &delta.warnings {
                    warn!(server_id, "{}", warning);
                }
                let applied = self.store.apply_haproxy_delta(server_id, &delta, now).await?;
                debug!(
                    server_id,
                    created = applied.created_server_ids.len(),
                    tombstoned = applied.tombstoned_server_ids.len(),
                    "applied haproxy batch"
                );
                for id in applied.created_server_ids {
                    self.mapping.resolve_haproxy_server(id).await?;
                }
                for id in applied.tombstoned_server_ids {
                    self.mapping
                        .handle_entity_disappeared(
                            flotilla_persistence::model::MappingEntityType::HaproxyServer,
                            id,
                        )
                        .await?;
                }
            }
            SourceBatch::Eureka {
                eureka_server_id,
                applications,
            } => {
                let (prior_applications, prior_instances) =
                    self.store.eureka_find_tree(eureka_server_id).await?;
                let delta = reconcile_eureka(&prior_applications, &prior_instances, &applications);
                for warning in &delta.warnings {
                    warn!(eureka_server_id, "{}", warning);
                }
                let applied = self
                    .store
                    .apply_eureka_delta(eureka_server_id, &delta, now)
                    .await?;
                debug!(
                    eureka_server_id,
                    created = applied.created_instance_ids.len(),
                    tombstoned = applied.tombstoned_instance_ids.len(),
                    "applied eureka batch"
                );
                for id in applied.created_instance_ids {
                    self.mapping.resolve_eureka_instance(id).await?;
                }
                for id in applied.tombstoned_instance_ids {
                    self.mapping
                        .handle_entity_disappeared(
                            flotilla_persistence::model::MappingEntityType::EurekaInstance,
                            id,
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }
}
