//! Application mapping persistence trait

use async_trait::async_trait;

use crate::entity::{app_mapping, mapping_history};
use crate::model::{MappingEntityType, MappingReason};

/// Mapping storage operations
///
/// Every mutation appends its mapping-history row inside the same
/// transaction; a mapping change without history is a bug.
#[async_trait]
pub trait MappingPersistence: Send + Sync {
    async fn mapping_find_for_application(
        &self,
        application_id: i64,
    ) -> anyhow::Result<Vec<app_mapping::Model>>;

    async fn mapping_find_for_entity(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
    ) -> anyhow::Result<Option<app_mapping::Model>>;

    /// Create a mapping. A live duplicate surfaces `FlotillaError::Conflict`.
    async fn mapping_create(
        &self,
        application_id: i64,
        entity_type: MappingEntityType,
        entity_id: i64,
        is_manual: bool,
        mapped_by: Option<&str>,
        notes: Option<&str>,
        reason: MappingReason,
    ) -> anyhow::Result<app_mapping::Model>;

    /// Remove the mapping for an entity. Returns false when none exists.
    async fn mapping_remove(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
        reason: MappingReason,
        actor: Option<&str>,
    ) -> anyhow::Result<bool>;

    /// Record a resolution that produced no mapping (reason `ambiguous`)
    async fn mapping_record_unresolved(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
        notes: Option<&str>,
    ) -> anyhow::Result<()>;

    /// Count of manual mappings (reconciliation-invariance checks)
    async fn mapping_count_manual(&self) -> anyhow::Result<i64>;

    async fn mapping_history_for_entity(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<mapping_history::Model>>;
}
