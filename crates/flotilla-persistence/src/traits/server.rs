//! Server persistence trait

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::entity::server;
use crate::model::ServerStatus;

/// Server (host) storage operations
#[async_trait]
pub trait ServerPersistence: Send + Sync {
    /// All registered servers
    async fn server_find_all(&self) -> anyhow::Result<Vec<server::Model>>;

    async fn server_find_by_id(&self, id: i64) -> anyhow::Result<Option<server::Model>>;

    async fn server_find_by_name(&self, name: &str) -> anyhow::Result<Option<server::Model>>;

    /// Servers flagged as HAProxy nodes
    async fn server_find_haproxy_nodes(&self) -> anyhow::Result<Vec<server::Model>>;

    /// Servers flagged as Eureka nodes
    async fn server_find_eureka_nodes(&self) -> anyhow::Result<Vec<server::Model>>;

    /// Register a server. Surfaces a name conflict as `FlotillaError::Conflict`.
    async fn server_create(
        &self,
        name: &str,
        ip: &str,
        agent_port: i32,
        is_haproxy_node: bool,
        is_eureka_node: bool,
        eureka_url: Option<&str>,
    ) -> anyhow::Result<server::Model>;

    /// Record the outcome of a reachability check
    async fn server_update_reachability(
        &self,
        id: i64,
        status: ServerStatus,
        checked_at: NaiveDateTime,
    ) -> anyhow::Result<()>;

    /// Operator-initiated delete; cascades to instances
    async fn server_delete(&self, id: i64) -> anyhow::Result<bool>;
}
