//! EurekaPersistence implementation

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::Expr;
use sea_orm::*;

use flotilla_common::utils::now_utc;

use super::ExternalDbPersistService;
use crate::entity::{
    app_mapping, eureka_application, eureka_instance, eureka_server, eureka_status_history,
};
use crate::model::{
    AppliedEureka, EurekaApplicationCreate, EurekaDelta, EurekaInstanceObservation,
    MappingEntityType,
};
use crate::traits::EurekaPersistence;

fn instance_fields(
    observed: &EurekaInstanceObservation,
    now: NaiveDateTime,
) -> eureka_instance::ActiveModel {
    eureka_instance::ActiveModel {
        hostname: Set(observed.hostname.clone()),
        ip: Set(observed.ip.clone()),
        port: Set(observed.port),
        status: Set(observed.status.clone()),
        last_heartbeat: Set(observed.last_heartbeat),
        metadata: Set(observed.metadata.clone()),
        last_seen: Set(Some(now)),
        updated_at: Set(now),
        ..Default::default()
    }
}

async fn insert_status_history(
    txn: &DatabaseTransaction,
    instance_id: i64,
    old_status: Option<&str>,
    new_status: &str,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    eureka_status_history::ActiveModel {
        id: NotSet,
        eureka_instance_id: Set(Some(instance_id)),
        old_status: Set(old_status.map(str::to_string)),
        new_status: Set(new_status.to_string()),
        changed_at: Set(now),
    }
    .insert(txn)
    .await?;
    Ok(())
}

async fn insert_application_tree(
    txn: &DatabaseTransaction,
    eureka_server_id: i64,
    create: &EurekaApplicationCreate,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<i64>> {
    let application = eureka_application::ActiveModel {
        id: NotSet,
        eureka_server_id: Set(eureka_server_id),
        name: Set(create.name.clone()),
        last_seen: Set(Some(now)),
        removed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(txn)
    .await?;

    let mut created = Vec::with_capacity(create.instances.len());
    for observed in &create.instances {
        let mut model = instance_fields(observed, now);
        model.id = NotSet;
        model.eureka_application_id = Set(application.id);
        model.instance_id = Set(observed.instance_id.clone());
        model.removed_at = Set(None);
        model.created_at = Set(now);
        let inserted = model.insert(txn).await?;
        insert_status_history(txn, inserted.id, None, &observed.status, now).await?;
        created.push(inserted.id);
    }
    Ok(created)
}

#[async_trait]
impl EurekaPersistence for ExternalDbPersistService {
    async fn eureka_find_servers(&self) -> anyhow::Result<Vec<eureka_server::Model>> {
        Ok(eureka_server::Entity::find()
            .filter(eureka_server::Column::RemovedAt.is_null())
            .order_by_asc(eureka_server::Column::Url)
            .all(self.db())
            .await?)
    }

    async fn eureka_server_upsert(
        &self,
        server_id: Option<i64>,
        url: &str,
    ) -> anyhow::Result<eureka_server::Model> {
        let now = now_utc();
        if let Some(existing) = eureka_server::Entity::find()
            .filter(eureka_server::Column::Url.eq(url))
            .one(self.db())
            .await?
        {
            let revived = eureka_server::ActiveModel {
                id: Set(existing.id),
                server_id: Set(server_id),
                removed_at: Set(None),
                updated_at: Set(now),
                ..Default::default()
            }
            .update(self.db())
            .await?;
            return Ok(revived);
        }
        let model = eureka_server::ActiveModel {
            id: NotSet,
            server_id: Set(server_id),
            url: Set(url.to_string()),
            last_seen: Set(None),
            removed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await?;
        Ok(model)
    }

    async fn eureka_find_tree(
        &self,
        eureka_server_id: i64,
    ) -> anyhow::Result<(Vec<eureka_application::Model>, Vec<eureka_instance::Model>)> {
        let applications = eureka_application::Entity::find()
            .filter(eureka_application::Column::EurekaServerId.eq(eureka_server_id))
            .all(self.db())
            .await?;
        if applications.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let instances = eureka_instance::Entity::find()
            .filter(
                eureka_instance::Column::EurekaApplicationId
                    .is_in(applications.iter().map(|a| a.id).collect::<Vec<_>>()),
            )
            .all(self.db())
            .await?;
        Ok((applications, instances))
    }

    async fn eureka_instance_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<eureka_instance::Model>> {
        Ok(eureka_instance::Entity::find_by_id(id).one(self.db()).await?)
    }

    async fn apply_eureka_delta(
        &self,
        eureka_server_id: i64,
        delta: &EurekaDelta,
        now: NaiveDateTime,
    ) -> anyhow::Result<AppliedEureka> {
        let txn = self.db().begin().await?;
        let mut applied = AppliedEureka::default();

        eureka_server::ActiveModel {
            id: Set(eureka_server_id),
            last_seen: Set(Some(now)),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&txn)
        .await?;

        for create in &delta.application_creates {
            let ids = insert_application_tree(&txn, eureka_server_id, create, now).await?;
            applied.created_instance_ids.extend(ids);
        }

        for update in &delta.application_updates {
            eureka_application::ActiveModel {
                id: Set(update.id),
                last_seen: Set(Some(now)),
                removed_at: if update.revive { Set(None) } else { NotSet },
                updated_at: Set(now),
                ..Default::default()
            }
            .update(&txn)
            .await?;

            for observed in &update.instance_creates {
                let mut model = instance_fields(observed, now);
                model.id = NotSet;
                model.eureka_application_id = Set(update.id);
                model.instance_id = Set(observed.instance_id.clone());
                model.removed_at = Set(None);
                model.created_at = Set(now);
                let inserted = model.insert(&txn).await?;
                insert_status_history(&txn, inserted.id, None, &observed.status, now).await?;
                applied.created_instance_ids.push(inserted.id);
            }

            for instance_update in &update.instance_updates {
                let mut model = instance_fields(&instance_update.observed, now);
                model.id = Set(instance_update.id);
                if instance_update.revive {
                    model.removed_at = Set(None);
                }
                eureka_instance::Entity::update(model).exec(&txn).await?;
                if let Some((old, new)) = &instance_update.status_change {
                    insert_status_history(&txn, instance_update.id, old.as_deref(), new, now)
                        .await?;
                }
            }

            if !update.instance_tombstones.is_empty() {
                eureka_instance::Entity::update_many()
                    .col_expr(eureka_instance::Column::RemovedAt, Expr::value(Some(now)))
                    .col_expr(eureka_instance::Column::UpdatedAt, Expr::value(now))
                    .filter(eureka_instance::Column::Id.is_in(update.instance_tombstones.clone()))
                    .filter(eureka_instance::Column::RemovedAt.is_null())
                    .exec(&txn)
                    .await?;
                applied
                    .tombstoned_instance_ids
                    .extend(update.instance_tombstones.iter().copied());
            }
        }

        if !delta.application_tombstones.is_empty() {
            let buried: Vec<i64> = eureka_instance::Entity::find()
                .select_only()
                .column(eureka_instance::Column::Id)
                .filter(
                    eureka_instance::Column::EurekaApplicationId
                        .is_in(delta.application_tombstones.clone()),
                )
                .filter(eureka_instance::Column::RemovedAt.is_null())
                .into_tuple()
                .all(&txn)
                .await?;
            if !buried.is_empty() {
                eureka_instance::Entity::update_many()
                    .col_expr(eureka_instance::Column::RemovedAt, Expr::value(Some(now)))
                    .col_expr(eureka_instance::Column::UpdatedAt, Expr::value(now))
                    .filter(eureka_instance::Column::Id.is_in(buried.clone()))
                    .exec(&txn)
                    .await?;
                applied.tombstoned_instance_ids.extend(buried);
            }
            eureka_application::Entity::update_many()
                .col_expr(eureka_application::Column::RemovedAt, Expr::value(Some(now)))
                .col_expr(eureka_application::Column::UpdatedAt, Expr::value(now))
                .filter(eureka_application::Column::Id.is_in(delta.application_tombstones.clone()))
                .filter(eureka_application::Column::RemovedAt.is_null())
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(applied)
    }

    async fn eureka_purge_tombstoned(&self, cutoff: NaiveDateTime) -> anyhow::Result<u64> {
        let mapped = app_mapping::Entity::find()
            .select_only()
            .column(app_mapping::Column::EntityId)
            .filter(
                app_mapping::Column::EntityType.eq(MappingEntityType::EurekaInstance.as_str()),
            )
            .into_query();
        let instances = eureka_instance::Entity::delete_many()
            .filter(eureka_instance::Column::RemovedAt.lt(cutoff))
            .filter(
                Expr::col((eureka_instance::Entity, eureka_instance::Column::Id))
                    .not_in_subquery(mapped),
            )
            .exec(self.db())
            .await?;

        let empty_applications: Vec<i64> = eureka_application::Entity::find()
            .select_only()
            .column(eureka_application::Column::Id)
            .filter(eureka_application::Column::RemovedAt.lt(cutoff))
            .filter(
                Expr::col((eureka_application::Entity, eureka_application::Column::Id))
                    .not_in_subquery(
                        eureka_instance::Entity::find()
                            .select_only()
                            .column(eureka_instance::Column::EurekaApplicationId)
                            .into_query(),
                    ),
            )
            .into_tuple()
            .all(self.db())
            .await?;
        let mut purged = instances.rows_affected;
        if !empty_applications.is_empty() {
            let applications = eureka_application::Entity::delete_many()
                .filter(eureka_application::Column::Id.is_in(empty_applications))
                .exec(self.db())
                .await?;
            purged += applications.rows_affected;
        }
        Ok(purged)
    }
}
