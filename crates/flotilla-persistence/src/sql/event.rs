//! EventPersistence implementation

use async_trait::async_trait;
use sea_orm::*;

use flotilla_common::utils::now_utc;

use super::ExternalDbPersistService;
use crate::entity::{event, version_history};
use crate::traits::EventPersistence;

/// Delete events of one instance beyond the newest `retention` rows
async fn trim_instance_events<C: ConnectionTrait>(
    conn: &C,
    instance_id: i64,
    retention: u64,
) -> anyhow::Result<u64> {
    let keep: Vec<i64> = event::Entity::find()
        .select_only()
        .column(event::Column::Id)
        .filter(event::Column::InstanceId.eq(instance_id))
        .order_by_desc(event::Column::Id)
        .limit(retention)
        .into_tuple()
        .all(conn)
        .await?;
    let deleted = event::Entity::delete_many()
        .filter(event::Column::InstanceId.eq(instance_id))
        .filter(event::Column::Id.is_not_in(keep))
        .exec(conn)
        .await?;
    Ok(deleted.rows_affected)
}

#[async_trait]
impl EventPersistence for ExternalDbPersistService {
    async fn event_append(
        &self,
        instance_id: i64,
        event_type: &str,
        message: Option<&str>,
        retention: u64,
    ) -> anyhow::Result<()> {
        let txn = self.db().begin().await?;
        event::ActiveModel {
            id: NotSet,
            instance_id: Set(instance_id),
            event_type: Set(event_type.to_string()),
            message: Set(message.map(str::to_string)),
            created_at: Set(now_utc()),
        }
        .insert(&txn)
        .await?;
        trim_instance_events(&txn, instance_id, retention).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn events_recent(
        &self,
        instance_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<event::Model>> {
        Ok(event::Entity::find()
            .filter(event::Column::InstanceId.eq(instance_id))
            .order_by_desc(event::Column::Id)
            .limit(limit)
            .all(self.db())
            .await?)
    }

    async fn version_history_append(
        &self,
        instance_id: i64,
        old_version: Option<&str>,
        new_version: Option<&str>,
        changed_by: Option<&str>,
        reason: Option<&str>,
    ) -> anyhow::Result<()> {
        version_history::ActiveModel {
            id: NotSet,
            instance_id: Set(Some(instance_id)),
            old_version: Set(old_version.map(str::to_string)),
            new_version: Set(new_version.map(str::to_string)),
            changed_by: Set(changed_by.map(str::to_string)),
            reason: Set(reason.map(str::to_string)),
            changed_at: Set(now_utc()),
        }
        .insert(self.db())
        .await?;
        Ok(())
    }

    async fn version_history_recent(
        &self,
        instance_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<version_history::Model>> {
        Ok(version_history::Entity::find()
            .filter(version_history::Column::InstanceId.eq(instance_id))
            .order_by_desc(version_history::Column::Id)
            .limit(limit)
            .all(self.db())
            .await?)
    }

    async fn event_trim_all(&self, retention: u64) -> anyhow::Result<u64> {
        let instance_ids: Vec<i64> = event::Entity::find()
            .select_only()
            .column(event::Column::InstanceId)
            .distinct()
            .into_tuple()
            .all(self.db())
            .await?;
        let mut total = 0;
        for instance_id in instance_ids {
            total += trim_instance_events(self.db(), instance_id, retention).await?;
        }
        Ok(total)
    }
}
