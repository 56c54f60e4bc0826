//! MappingPersistence implementation
//!
//! Every mapping mutation appends its history row inside the same
//! transaction.

use async_trait::async_trait;
use sea_orm::*;

use flotilla_common::{FlotillaError, utils::now_utc};

use super::ExternalDbPersistService;
use crate::entity::{app_mapping, mapping_history};
use crate::model::{MappingAction, MappingEntityType, MappingReason};
use crate::traits::MappingPersistence;

#[allow(clippy::too_many_arguments)]
async fn append_history(
    txn: &DatabaseTransaction,
    application_id: Option<i64>,
    entity_type: MappingEntityType,
    entity_id: i64,
    action: MappingAction,
    reason: MappingReason,
    actor: Option<&str>,
    notes: Option<&str>,
) -> anyhow::Result<()> {
    mapping_history::ActiveModel {
        id: NotSet,
        application_id: Set(application_id),
        entity_type: Set(entity_type.as_str().to_string()),
        entity_id: Set(entity_id),
        action: Set(action.as_str().to_string()),
        reason: Set(reason.as_str().to_string()),
        actor: Set(actor.map(str::to_string)),
        notes: Set(notes.map(str::to_string)),
        changed_at: Set(now_utc()),
    }
    .insert(txn)
    .await?;
    Ok(())
}

#[async_trait]
impl MappingPersistence for ExternalDbPersistService {
    async fn mapping_find_for_application(
        &self,
        application_id: i64,
    ) -> anyhow::Result<Vec<app_mapping::Model>> {
        Ok(app_mapping::Entity::find()
            .filter(app_mapping::Column::ApplicationId.eq(application_id))
            .order_by_asc(app_mapping::Column::Id)
            .all(self.db())
            .await?)
    }

    async fn mapping_find_for_entity(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
    ) -> anyhow::Result<Option<app_mapping::Model>> {
        Ok(app_mapping::Entity::find()
            .filter(app_mapping::Column::EntityType.eq(entity_type.as_str()))
            .filter(app_mapping::Column::EntityId.eq(entity_id))
            .one(self.db())
            .await?)
    }

    async fn mapping_create(
        &self,
        application_id: i64,
        entity_type: MappingEntityType,
        entity_id: i64,
        is_manual: bool,
        mapped_by: Option<&str>,
        notes: Option<&str>,
        reason: MappingReason,
    ) -> anyhow::Result<app_mapping::Model> {
        let txn = self.db().begin().await?;
        let existing = app_mapping::Entity::find()
            .filter(app_mapping::Column::EntityType.eq(entity_type.as_str()))
            .filter(app_mapping::Column::EntityId.eq(entity_id))
            .one(&txn)
            .await?;
        if let Some(current) = existing {
            return Err(FlotillaError::Conflict(format!(
                "{} {} is already mapped to application {}",
                entity_type.as_str(),
                entity_id,
                current.application_id
            ))
            .into());
        }
        let now = now_utc();
        let model = app_mapping::ActiveModel {
            id: NotSet,
            application_id: Set(application_id),
            entity_type: Set(entity_type.as_str().to_string()),
            entity_id: Set(entity_id),
            is_manual: Set(is_manual),
            mapped_by: Set(mapped_by.map(str::to_string)),
            notes: Set(notes.map(str::to_string)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        append_history(
            &txn,
            Some(application_id),
            entity_type,
            entity_id,
            MappingAction::Created,
            reason,
            mapped_by,
            notes,
        )
        .await?;
        txn.commit().await?;
        Ok(model)
    }

    async fn mapping_remove(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
        reason: MappingReason,
        actor: Option<&str>,
    ) -> anyhow::Result<bool> {
        let txn = self.db().begin().await?;
        let Some(existing) = app_mapping::Entity::find()
            .filter(app_mapping::Column::EntityType.eq(entity_type.as_str()))
            .filter(app_mapping::Column::EntityId.eq(entity_id))
            .one(&txn)
            .await?
        else {
            return Ok(false);
        };
        app_mapping::Entity::delete_by_id(existing.id)
            .exec(&txn)
            .await?;
        append_history(
            &txn,
            Some(existing.application_id),
            entity_type,
            entity_id,
            MappingAction::Removed,
            reason,
            actor,
            None,
        )
        .await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn mapping_record_unresolved(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
        notes: Option<&str>,
    ) -> anyhow::Result<()> {
        let txn = self.db().begin().await?;
        append_history(
            &txn,
            None,
            entity_type,
            entity_id,
            MappingAction::Changed,
            MappingReason::Ambiguous,
            None,
            notes,
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    async fn mapping_count_manual(&self) -> anyhow::Result<i64> {
        let count = app_mapping::Entity::find()
            .filter(app_mapping::Column::IsManual.eq(true))
            .count(self.db())
            .await?;
        Ok(count as i64)
    }

    async fn mapping_history_for_entity(
        &self,
        entity_type: MappingEntityType,
        entity_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<mapping_history::Model>> {
        Ok(mapping_history::Entity::find()
            .filter(mapping_history::Column::EntityType.eq(entity_type.as_str()))
            .filter(mapping_history::Column::EntityId.eq(entity_id))
            .order_by_desc(mapping_history::Column::Id)
            .limit(limit)
            .all(self.db())
            .await?)
    }
}
