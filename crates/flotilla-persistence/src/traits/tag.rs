//! Tag persistence trait

use async_trait::async_trait;

use crate::entity::tag;

/// Tag storage operations
///
/// Assign/unassign write the tag history rows themselves; callers never
/// append tag history directly.
#[async_trait]
pub trait TagPersistence: Send + Sync {
    async fn tag_find_all(&self) -> anyhow::Result<Vec<tag::Model>>;

    async fn tag_find_or_create(&self, name: &str, is_system: bool)
    -> anyhow::Result<tag::Model>;

    async fn tags_for_instance(&self, instance_id: i64) -> anyhow::Result<Vec<tag::Model>>;

    async fn tags_for_group(&self, group_id: i64) -> anyhow::Result<Vec<tag::Model>>;

    /// Attach a tag to an instance. Returns false when already attached.
    async fn tag_assign(
        &self,
        instance_id: i64,
        tag_name: &str,
        actor: &str,
    ) -> anyhow::Result<bool>;

    /// Detach a tag. A tag flagged `is_system` surfaces
    /// `FlotillaError::PreconditionFailed`. Returns false when not attached.
    async fn tag_unassign(
        &self,
        instance_id: i64,
        tag_name: &str,
        actor: &str,
    ) -> anyhow::Result<bool>;
}
