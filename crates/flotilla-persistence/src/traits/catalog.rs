//! Application catalog and group persistence traits

use async_trait::async_trait;

use crate::entity::{app_catalog, app_group};

/// Catalog entry storage operations
#[async_trait]
pub trait CatalogPersistence: Send + Sync {
    async fn catalog_find_all(&self) -> anyhow::Result<Vec<app_catalog::Model>>;

    async fn catalog_find_by_id(&self, id: i64) -> anyhow::Result<Option<app_catalog::Model>>;

    async fn catalog_find_by_name(&self, name: &str)
    -> anyhow::Result<Option<app_catalog::Model>>;

    async fn catalog_create(
        &self,
        name: &str,
        app_type: &str,
        default_playbook: Option<&str>,
        default_distr_url: Option<&str>,
        artifact_extension: Option<&str>,
    ) -> anyhow::Result<app_catalog::Model>;
}

/// Application group storage operations
#[async_trait]
pub trait GroupPersistence: Send + Sync {
    async fn group_find_all(&self) -> anyhow::Result<Vec<app_group::Model>>;

    async fn group_find_by_id(&self, id: i64) -> anyhow::Result<Option<app_group::Model>>;

    async fn group_find_by_ids(&self, ids: &[i64]) -> anyhow::Result<Vec<app_group::Model>>;

    async fn group_create(
        &self,
        name: &str,
        distr_url: Option<&str>,
        update_playbook: Option<&str>,
        batch_grouping: &str,
    ) -> anyhow::Result<app_group::Model>;
}
