//! CatalogPersistence and GroupPersistence implementations

use async_trait::async_trait;
use sea_orm::*;

use flotilla_common::{FlotillaError, utils::now_utc};

use super::ExternalDbPersistService;
use crate::entity::{app_catalog, app_group};
use crate::traits::{CatalogPersistence, GroupPersistence};

#[async_trait]
impl CatalogPersistence for ExternalDbPersistService {
    async fn catalog_find_all(&self) -> anyhow::Result<Vec<app_catalog::Model>> {
        Ok(app_catalog::Entity::find()
            .order_by_asc(app_catalog::Column::Name)
            .all(self.db())
            .await?)
    }

    async fn catalog_find_by_id(&self, id: i64) -> anyhow::Result<Option<app_catalog::Model>> {
        Ok(app_catalog::Entity::find_by_id(id).one(self.db()).await?)
    }

    async fn catalog_find_by_name(
        &self,
        name: &str,
    ) -> anyhow::Result<Option<app_catalog::Model>> {
        Ok(app_catalog::Entity::find()
            .filter(app_catalog::Column::Name.eq(name))
            .one(self.db())
            .await?)
    }

    async fn catalog_create(
        &self,
        name: &str,
        app_type: &str,
        default_playbook: Option<&str>,
        default_distr_url: Option<&str>,
        artifact_extension: Option<&str>,
    ) -> anyhow::Result<app_catalog::Model> {
        if self.catalog_find_by_name(name).await?.is_some() {
            return Err(
                FlotillaError::Conflict(format!("catalog entry '{}' already exists", name)).into(),
            );
        }
        let now = now_utc();
        let model = app_catalog::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            app_type: Set(app_type.to_string()),
            default_playbook: Set(default_playbook.map(str::to_string)),
            default_distr_url: Set(default_distr_url.map(str::to_string)),
            artifact_extension: Set(artifact_extension.map(str::to_string)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await?;
        Ok(model)
    }
}

#[async_trait]
impl GroupPersistence for ExternalDbPersistService {
    async fn group_find_all(&self) -> anyhow::Result<Vec<app_group::Model>> {
        Ok(app_group::Entity::find()
            .order_by_asc(app_group::Column::Name)
            .all(self.db())
            .await?)
    }

    async fn group_find_by_id(&self, id: i64) -> anyhow::Result<Option<app_group::Model>> {
        Ok(app_group::Entity::find_by_id(id).one(self.db()).await?)
    }

    async fn group_find_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<app_group::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(app_group::Entity::find()
            .filter(app_group::Column::Id.is_in(ids.to_vec()))
            .all(self.db())
            .await?)
    }

    async fn group_create(
        &self,
        name: &str,
        distr_url: Option<&str>,
        update_playbook: Option<&str>,
        batch_grouping: &str,
    ) -> anyhow::Result<app_group::Model> {
        let existing = app_group::Entity::find()
            .filter(app_group::Column::Name.eq(name))
            .one(self.db())
            .await?;
        if existing.is_some() {
            return Err(
                FlotillaError::Conflict(format!("group '{}' already exists", name)).into(),
            );
        }
        let now = now_utc();
        let model = app_group::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            distr_url: Set(distr_url.map(str::to_string)),
            update_playbook: Set(update_playbook.map(str::to_string)),
            batch_grouping: Set(batch_grouping.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await?;
        Ok(model)
    }
}
