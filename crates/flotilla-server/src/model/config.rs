//! Configuration management
//!
//! Loads `conf/application.yml` (optional), `FLOTILLA__`-prefixed
//! environment overrides, and CLI arguments, and exposes typed accessors
//! with defaults. An unreadable configuration aborts startup; nothing here
//! is consulted lazily after boot.

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "flotilla-server")]
struct Cli {
    #[arg(long = "config", help = "Path to the configuration file")]
    config: Option<String>,
    #[arg(long = "db-url", env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
}

/// Application configuration loaded from config file, environment, and CLI
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new() -> Self {
        let args = Cli::parse();
        let config_file = args
            .config
            .unwrap_or_else(|| "conf/application".to_string());
        let mut builder = Config::builder()
            .add_source(config::File::with_name(&config_file).required(false))
            .add_source(
                Environment::with_prefix("FLOTILLA")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(url) = args.database_url {
            builder = builder
                .set_override("flotilla.db.url", url)
                .expect("failed to set database URL override");
        }
        if let Some(port) = args.port {
            builder = builder
                .set_override("flotilla.server.port", i64::from(port))
                .expect("failed to set port override");
        }

        let config = builder
            .build()
            .expect("failed to build configuration - check conf/application.yml");
        Configuration { config }
    }

    /// Build from an already-assembled `Config` (tests)
    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    // ========================================================================
    // Server
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string("flotilla.server.address")
            .unwrap_or_else(|_| "0.0.0.0".to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int("flotilla.server.port")
            .unwrap_or(8640) as u16
    }

    /// Base URL the playbook runner posts callbacks to
    pub fn callback_base_url(&self) -> String {
        self.config
            .get_string("flotilla.server.callback_base_url")
            .unwrap_or_else(|_| format!("http://127.0.0.1:{}", self.server_port()))
    }

    pub fn log_level(&self) -> String {
        self.config
            .get_string("flotilla.log.level")
            .unwrap_or_else(|_| "info".to_string())
    }

    // ========================================================================
    // Database
    // ========================================================================

    pub fn database_url(&self) -> Option<String> {
        self.config.get_string("flotilla.db.url").ok()
    }

    pub async fn database_connection(&self) -> anyhow::Result<DatabaseConnection> {
        let url = self
            .database_url()
            .ok_or_else(|| anyhow::anyhow!("flotilla.db.url is not configured"))?;
        let mut options = ConnectOptions::new(url);
        options
            .max_connections(
                self.config
                    .get_int("flotilla.db.max_connections")
                    .unwrap_or(16) as u32,
            )
            .min_connections(2)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        Ok(Database::connect(options).await?)
    }

    // ========================================================================
    // Collectors
    // ========================================================================

    pub fn agent_poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int("flotilla.collector.agent.poll_interval_secs")
                .unwrap_or(30) as u64,
        )
    }

    pub fn haproxy_poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int("flotilla.collector.haproxy.poll_interval_secs")
                .unwrap_or(10) as u64,
        )
    }

    pub fn eureka_poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int("flotilla.collector.eureka.poll_interval_secs")
                .unwrap_or(30) as u64,
        )
    }

    fn fetch_timeout(&self, source: &str) -> Duration {
        Duration::from_secs(
            self.config
                .get_int(&format!(
                    "flotilla.collector.{}.fetch_timeout_secs",
                    source
                ))
                .unwrap_or(5) as u64,
        )
    }

    fn failure_threshold(&self, source: &str) -> u32 {
        self.config
            .get_int(&format!(
                "flotilla.collector.{}.failure_threshold",
                source
            ))
            .unwrap_or(3) as u32
    }

    fn collector_concurrency(&self, source: &str) -> usize {
        self.config
            .get_int(&format!("flotilla.collector.{}.concurrency", source))
            .unwrap_or(8) as usize
    }

    pub fn collector_config(&self, source: &str) -> flotilla_collector::CollectorConfig {
        let poll_interval = match source {
            "agent" => self.agent_poll_interval(),
            "haproxy" => self.haproxy_poll_interval(),
            _ => self.eureka_poll_interval(),
        };
        flotilla_collector::CollectorConfig {
            poll_interval,
            fetch_timeout: self.fetch_timeout(source),
            concurrency: self.collector_concurrency(source),
            failure_threshold: self.failure_threshold(source),
        }
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    pub fn retention_days(&self) -> i64 {
        self.config
            .get_int("flotilla.reconcile.retention_days")
            .unwrap_or(14)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int("flotilla.reconcile.purge_interval_secs")
                .unwrap_or(3600) as u64,
        )
    }

    pub fn mapping_sticky_window(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int("flotilla.mapping.sticky_window_secs")
                .unwrap_or(600) as u64,
        )
    }

    // ========================================================================
    // Tasks
    // ========================================================================

    pub fn task_concurrency(&self) -> usize {
        self.config
            .get_int("flotilla.tasks.global_concurrency")
            .unwrap_or(4) as usize
    }

    pub fn per_server_task_concurrency(&self) -> usize {
        self.config
            .get_int("flotilla.tasks.per_server_concurrency")
            .unwrap_or(1) as usize
    }

    pub fn drain_wait_max_minutes(&self) -> u32 {
        self.config
            .get_int("flotilla.tasks.drain_wait_max_minutes")
            .unwrap_or(60) as u32
    }

    pub fn runner_command(&self) -> Vec<String> {
        self.config
            .get_array("flotilla.tasks.runner_command")
            .ok()
            .map(|values| {
                values
                    .into_iter()
                    .filter_map(|v| v.into_string().ok())
                    .collect::<Vec<_>>()
            })
            .filter(|command: &Vec<String>| !command.is_empty())
            .unwrap_or_else(|| vec!["/usr/local/bin/flotilla-runner".to_string()])
    }

    // ========================================================================
    // Artifacts and events
    // ========================================================================

    pub fn artifact_repo_url(&self) -> Option<String> {
        self.config.get_string("flotilla.artifacts.repo_url").ok()
    }

    pub fn artifact_limit(&self) -> u64 {
        self.config
            .get_int("flotilla.artifacts.list_limit")
            .unwrap_or(50) as u64
    }

    pub fn event_retention(&self) -> u64 {
        self.config
            .get_int("flotilla.events.retention_count")
            .unwrap_or(50) as u64
    }

    pub fn orchestrator_config(&self) -> flotilla_orchestrator::OrchestratorConfig {
        flotilla_orchestrator::OrchestratorConfig {
            global_concurrency: self.task_concurrency(),
            per_server_concurrency: self.per_server_task_concurrency(),
            drain_wait_max_minutes: self.drain_wait_max_minutes(),
            runner_command: self.runner_command(),
            callback_base_url: self.callback_base_url(),
            event_retention: self.event_retention(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let configuration = Configuration::from_config(Config::default());
        assert_eq!(configuration.server_address(), "0.0.0.0");
        assert_eq!(configuration.server_port(), 8640);
        assert_eq!(configuration.retention_days(), 14);
        assert_eq!(configuration.task_concurrency(), 4);
        assert_eq!(configuration.per_server_task_concurrency(), 1);
        assert_eq!(configuration.drain_wait_max_minutes(), 60);
        assert_eq!(configuration.event_retention(), 50);
        assert!(configuration.database_url().is_none());
    }

    #[test]
    fn test_collector_config_per_source() {
        let config = Config::builder()
            .set_override("flotilla.collector.haproxy.poll_interval_secs", 5)
            .unwrap()
            .set_override("flotilla.collector.haproxy.concurrency", 2)
            .unwrap()
            .build()
            .unwrap();
        let configuration = Configuration::from_config(config);
        let haproxy = configuration.collector_config("haproxy");
        assert_eq!(haproxy.poll_interval, Duration::from_secs(5));
        assert_eq!(haproxy.concurrency, 2);
        let agent = configuration.collector_config("agent");
        assert_eq!(agent.poll_interval, Duration::from_secs(30));
        assert_eq!(agent.concurrency, 8);
    }

    #[test]
    fn test_runner_command_default() {
        let configuration = Configuration::from_config(Config::default());
        assert_eq!(
            configuration.runner_command(),
            vec!["/usr/local/bin/flotilla-runner".to_string()]
        );
    }
}
