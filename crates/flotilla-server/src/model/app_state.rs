//! Application state shared across all handlers

use std::sync::Arc;

use tokio::sync::mpsc;

use flotilla_collector::FetchStatusTracker;
use flotilla_orchestrator::{Orchestrator, ProgressRouter};
use flotilla_persistence::PersistenceService;
use flotilla_reconcile::MappingService;

use crate::artifact::ArtifactClient;

use super::config::Configuration;

/// Application state shared across all handlers
pub struct AppState {
    pub configuration: Configuration,
    pub persistence: Arc<dyn PersistenceService>,
    /// In-memory per-endpoint fetch-status, owned by the collectors
    pub fetch_status: Arc<FetchStatusTracker>,
    pub orchestrator: Arc<Orchestrator>,
    pub mapping: Arc<MappingService>,
    pub progress: Arc<ProgressRouter>,
    pub artifacts: ArtifactClient,
    /// Server ids to poll immediately (operator refresh)
    pub agent_refresh: mpsc::Sender<i64>,
    /// Server ids whose HAProxy view to re-sync immediately
    pub haproxy_sync: mpsc::Sender<i64>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("configuration", &self.configuration)
            .field("persistence", &"<dyn PersistenceService>")
            .field("fetch_status", &"<FetchStatusTracker>")
            .field("orchestrator", &"<Orchestrator>")
            .field("mapping", &"<MappingService>")
            .field("progress", &"<ProgressRouter>")
            .finish()
    }
}
