//! ServerPersistence implementation

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::*;

use flotilla_common::{FlotillaError, utils::now_utc};

use super::ExternalDbPersistService;
use crate::entity::server;
use crate::model::ServerStatus;
use crate::traits::ServerPersistence;

#[async_trait]
impl ServerPersistence for ExternalDbPersistService {
    async fn server_find_all(&self) -> anyhow::Result<Vec<server::Model>> {
        server::Entity::find()
            .order_by_asc(server::Column::Name)
            .all(self.db())
            .await
            .context("failed to list servers")
    }

    async fn server_find_by_id(&self, id: i64) -> anyhow::Result<Option<server::Model>> {
        Ok(server::Entity::find_by_id(id).one(self.db()).await?)
    }

    async fn server_find_by_name(&self, name: &str) -> anyhow::Result<Option<server::Model>> {
        Ok(server::Entity::find()
            .filter(server::Column::Name.eq(name))
            .one(self.db())
            .await?)
    }

    async fn server_find_haproxy_nodes(&self) -> anyhow::Result<Vec<server::Model>> {
        Ok(server::Entity::find()
            .filter(server::Column::IsHaproxyNode.eq(true))
            .order_by_asc(server::Column::Name)
            .all(self.db())
            .await?)
    }

    async fn server_find_eureka_nodes(&self) -> anyhow::Result<Vec<server::Model>> {
        Ok(server::Entity::find()
            .filter(server::Column::IsEurekaNode.eq(true))
            .order_by_asc(server::Column::Name)
            .all(self.db())
            .await?)
    }

    async fn server_create(
        &self,
        name: &str,
        ip: &str,
        agent_port: i32,
        is_haproxy_node: bool,
        is_eureka_node: bool,
        eureka_url: Option<&str>,
    ) -> anyhow::Result<server::Model> {
        if self.server_find_by_name(name).await?.is_some() {
            return Err(FlotillaError::Conflict(format!("server '{}' already exists", name)).into());
        }
        let now = now_utc();
        let model = server::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            ip: Set(ip.to_string()),
            agent_port: Set(agent_port),
            status: Set(ServerStatus::Unknown.as_str().to_string()),
            last_check: Set(None),
            is_haproxy_node: Set(is_haproxy_node),
            is_eureka_node: Set(is_eureka_node),
            eureka_url: Set(eureka_url.map(str::to_string)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await?;
        Ok(model)
    }

    async fn server_update_reachability(
        &self,
        id: i64,
        status: ServerStatus,
        checked_at: NaiveDateTime,
    ) -> anyhow::Result<()> {
        server::ActiveModel {
            id: Set(id),
            status: Set(status.as_str().to_string()),
            last_check: Set(Some(checked_at)),
            updated_at: Set(checked_at),
            ..Default::default()
        }
        .update(self.db())
        .await?;
        Ok(())
    }

    async fn server_delete(&self, id: i64) -> anyhow::Result<bool> {
        let result = server::Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(result.rows_affected > 0)
    }
}
