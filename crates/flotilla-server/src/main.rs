//! Main entry point for the Flotilla control plane server.
//!
//! Startup order: configuration, logging, database plus migrations, shared
//! services, background tasks (collectors, reconcile driver, dispatcher,
//! purge), then the HTTP listener. Only startup errors are fatal; after
//! boot the process runs until signalled.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use flotilla_collector::{AgentCollector, EurekaCollector, FetchStatusTracker, HaproxyCollector};
use flotilla_common::{STATUS_LOCK_TAG, VER_LOCK_TAG};
use flotilla_migration::{Migrator, MigratorTrait};
use flotilla_orchestrator::{
    CancelRegistry, Orchestrator, ProgressRouter, TaskDispatcher, TaskExecutor,
};
use flotilla_persistence::{ExternalDbPersistService, PersistenceService};
use flotilla_reconcile::{MappingService, PurgeService, ReconcileDriver};
use flotilla_server::artifact::ArtifactClient;
use flotilla_server::model::{AppState, Configuration};
use flotilla_server::startup::{self, ShutdownSignal};

const OBSERVATION_CHANNEL_CAPACITY: usize = 64;
const REFRESH_CHANNEL_CAPACITY: usize = 16;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let configuration = Configuration::new();
    startup::init_logging(&configuration.log_level());
    info!("flotilla server starting");

    // Database and schema; failures here abort startup
    let db = configuration.database_connection().await?;
    Migrator::up(&db, None).await?;
    let persistence: Arc<dyn PersistenceService> =
        Arc::new(ExternalDbPersistService::new(db));

    // Lock tags are system tags; make sure they exist before any submission
    persistence.tag_find_or_create(STATUS_LOCK_TAG, true).await?;
    persistence.tag_find_or_create(VER_LOCK_TAG, true).await?;

    let shutdown = ShutdownSignal::new();
    let fetch_status = Arc::new(FetchStatusTracker::new());
    let mapping = Arc::new(MappingService::new(
        persistence.clone(),
        configuration.mapping_sticky_window(),
    ));

    // Collectors feed the reconcile driver over one bounded channel
    let (batch_tx, batch_rx) = mpsc::channel(OBSERVATION_CHANNEL_CAPACITY);
    let (agent_refresh_tx, agent_refresh_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);
    let (haproxy_sync_tx, haproxy_sync_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);

    let driver = ReconcileDriver::new(persistence.clone(), mapping.clone());
    tokio::spawn(driver.run(batch_rx, shutdown.subscribe()));

    let agent_collector = AgentCollector::new(
        persistence.clone(),
        fetch_status.clone(),
        configuration.collector_config("agent"),
        batch_tx.clone(),
    );
    tokio::spawn(agent_collector.run(agent_refresh_rx, shutdown.subscribe()));

    let haproxy_collector = HaproxyCollector::new(
        persistence.clone(),
        fetch_status.clone(),
        configuration.collector_config("haproxy"),
        batch_tx.clone(),
    );
    tokio::spawn(haproxy_collector.run(haproxy_sync_rx, shutdown.subscribe()));

    let eureka_collector = EurekaCollector::new(
        persistence.clone(),
        fetch_status.clone(),
        configuration.collector_config("eureka"),
        batch_tx,
    );
    tokio::spawn(eureka_collector.run(shutdown.subscribe()));

    let purge = PurgeService::new(
        persistence.clone(),
        configuration.retention_days(),
        configuration.purge_interval(),
        configuration.event_retention(),
    );
    tokio::spawn(purge.run(shutdown.subscribe()));

    // Orchestrator and dispatcher
    let orchestrator_config = Arc::new(configuration.orchestrator_config());
    let cancels = Arc::new(CancelRegistry::new());
    let progress = Arc::new(ProgressRouter::new());
    let orchestrator = Arc::new(Orchestrator::new(
        persistence.clone(),
        cancels.clone(),
        progress.clone(),
        orchestrator_config.clone(),
    ));
    let executor = Arc::new(TaskExecutor::new(
        persistence.clone(),
        progress.clone(),
        orchestrator_config,
    ));
    let dispatcher = Arc::new(TaskDispatcher::new(
        persistence.clone(),
        executor,
        cancels,
        &configuration.orchestrator_config(),
    ));
    tokio::spawn(dispatcher.run(shutdown.subscribe()));

    // HTTP listener; a bind failure is fatal
    let app_state = Arc::new(AppState {
        artifacts: ArtifactClient::new(
            configuration.artifact_repo_url(),
            configuration.artifact_limit(),
        ),
        configuration: configuration.clone(),
        persistence,
        fetch_status,
        orchestrator,
        mapping,
        progress,
        agent_refresh: agent_refresh_tx,
        haproxy_sync: haproxy_sync_tx,
    });
    let address = configuration.server_address();
    let port = configuration.server_port();
    let server = startup::api_server(app_state, address.clone(), port)?;
    info!(%address, port, "operator API listening");

    let server_handle = server.handle();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        startup::wait_for_shutdown_signal(shutdown_for_signal).await;
    });
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = shutdown_rx.recv().await;
        server_handle.stop(true).await;
    });

    server.await?;
    info!("flotilla server stopped");
    Ok(())
}
