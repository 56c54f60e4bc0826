//! TagPersistence implementation
//!
//! Assign/unassign append tag history rows in the same transaction.

use async_trait::async_trait;
use sea_orm::*;

use flotilla_common::{FlotillaError, utils::now_utc};

use super::ExternalDbPersistService;
use crate::entity::{group_tag, instance_tag, tag, tag_history};
use crate::traits::TagPersistence;

async fn append_tag_history(
    txn: &DatabaseTransaction,
    instance_id: i64,
    tag_name: &str,
    action: &str,
    actor: &str,
) -> anyhow::Result<()> {
    tag_history::ActiveModel {
        id: NotSet,
        instance_id: Set(Some(instance_id)),
        tag_name: Set(tag_name.to_string()),
        action: Set(action.to_string()),
        actor: Set(Some(actor.to_string())),
        changed_at: Set(now_utc()),
    }
    .insert(txn)
    .await?;
    Ok(())
}

#[async_trait]
impl TagPersistence for ExternalDbPersistService {
    async fn tag_find_all(&self) -> anyhow::Result<Vec<tag::Model>> {
        Ok(tag::Entity::find()
            .order_by_asc(tag::Column::Name)
            .all(self.db())
            .await?)
    }

    async fn tag_find_or_create(
        &self,
        name: &str,
        is_system: bool,
    ) -> anyhow::Result<tag::Model> {
        if let Some(existing) = tag::Entity::find()
            .filter(tag::Column::Name.eq(name))
            .one(self.db())
            .await?
        {
            return Ok(existing);
        }
        let model = tag::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            is_system: Set(is_system),
            created_at: Set(now_utc()),
        }
        .insert(self.db())
        .await?;
        Ok(model)
    }

    async fn tags_for_instance(&self, instance_id: i64) -> anyhow::Result<Vec<tag::Model>> {
        let tag_ids: Vec<i64> = instance_tag::Entity::find()
            .select_only()
            .column(instance_tag::Column::TagId)
            .filter(instance_tag::Column::InstanceId.eq(instance_id))
            .into_tuple()
            .all(self.db())
            .await?;
        if tag_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(tag::Entity::find()
            .filter(tag::Column::Id.is_in(tag_ids))
            .order_by_asc(tag::Column::Name)
            .all(self.db())
            .await?)
    }

    async fn tags_for_group(&self, group_id: i64) -> anyhow::Result<Vec<tag::Model>> {
        let tag_ids: Vec<i64> = group_tag::Entity::find()
            .select_only()
            .column(group_tag::Column::TagId)
            .filter(group_tag::Column::GroupId.eq(group_id))
            .into_tuple()
            .all(self.db())
            .await?;
        if tag_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(tag::Entity::find()
            .filter(tag::Column::Id.is_in(tag_ids))
            .order_by_asc(tag::Column::Name)
            .all(self.db())
            .await?)
    }

    async fn tag_assign(
        &self,
        instance_id: i64,
        tag_name: &str,
        actor: &str,
    ) -> anyhow::Result<bool> {
        let tag_row = self.tag_find_or_create(tag_name, false).await?;
        let txn = self.db().begin().await?;
        let existing = instance_tag::Entity::find()
            .filter(instance_tag::Column::InstanceId.eq(instance_id))
            .filter(instance_tag::Column::TagId.eq(tag_row.id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            txn.commit().await?;
            return Ok(false);
        }
        instance_tag::ActiveModel {
            id: NotSet,
            instance_id: Set(instance_id),
            tag_id: Set(tag_row.id),
            created_at: Set(now_utc()),
        }
        .insert(&txn)
        .await?;
        append_tag_history(&txn, instance_id, tag_name, "add", actor).await?;
        txn.commit().await?;
        Ok(true)
    }

    async fn tag_unassign(
        &self,
        instance_id: i64,
        tag_name: &str,
        actor: &str,
    ) -> anyhow::Result<bool> {
        let Some(tag_row) = tag::Entity::find()
            .filter(tag::Column::Name.eq(tag_name))
            .one(self.db())
            .await?
        else {
            return Ok(false);
        };
        if tag_row.is_system {
            return Err(FlotillaError::PreconditionFailed(format!(
                "tag '{}' is a system tag and cannot be removed",
                tag_name
            ))
            .into());
        }
        let txn = self.db().begin().await?;
        let deleted = instance_tag::Entity::delete_many()
            .filter(instance_tag::Column::InstanceId.eq(instance_id))
            .filter(instance_tag::Column::TagId.eq(tag_row.id))
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            txn.commit().await?;
            return Ok(false);
        }
        append_tag_history(&txn, instance_id, tag_name, "remove", actor).await?;
        txn.commit().await?;
        Ok(true)
    }
}
