//! InstancePersistence implementation
//!
//! `apply_instance_delta` writes one whole agent batch in a single
//! transaction: creates, field updates with revival, audited history rows,
//! and tombstones.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::Expr;
use sea_orm::*;

use super::{ExternalDbPersistService, escape_sql_like_pattern};
use crate::entity::{
    app_group, app_instance, app_mapping, event, group_tag, instance_tag, server, tag,
    version_history,
};
use crate::model::{
    AppliedInstances, BatchGrouping, InstanceDelta, InstanceDetail, InstanceObservation,
    InstanceSearchFilter, MappingCandidate, PlanTarget,
};
use crate::traits::{
    EventPersistence, InstancePersistence, MappingPersistence, TagPersistence,
};

/// Fill an active model with the observed runtime fields
fn observed_fields(
    observed: &InstanceObservation,
    now: NaiveDateTime,
) -> app_instance::ActiveModel {
    app_instance::ActiveModel {
        status: Set(observed.status.clone()),
        version: Set(observed.version.clone()),
        pid: Set(observed.pid),
        start_time: Set(observed.start_time),
        ip: Set(observed.ip.clone()),
        port: Set(observed.port),
        app_path: Set(observed.app_path.clone()),
        log_path: Set(observed.log_path.clone()),
        container_id: Set(observed.container_id.clone()),
        container_image: Set(observed.container_image.clone()),
        container_tag: Set(observed.container_tag.clone()),
        eureka_registered: Set(observed.eureka_registered),
        eureka_url: Set(observed.eureka_url.clone()),
        last_seen: Set(Some(now)),
        updated_at: Set(now),
        ..Default::default()
    }
}

async fn insert_event(
    txn: &DatabaseTransaction,
    instance_id: i64,
    event_type: &str,
    message: String,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    event::ActiveModel {
        id: NotSet,
        instance_id: Set(instance_id),
        event_type: Set(event_type.to_string()),
        message: Set(Some(message)),
        created_at: Set(now),
    }
    .insert(txn)
    .await?;
    Ok(())
}

#[async_trait]
impl InstancePersistence for ExternalDbPersistService {
    async fn instance_search(
        &self,
        filter: &InstanceSearchFilter,
    ) -> anyhow::Result<Vec<app_instance::Model>> {
        let mut select = app_instance::Entity::find();
        if !filter.include_deleted {
            select = select.filter(app_instance::Column::DeletedAt.is_null());
        }
        if let Some(server_id) = filter.server_id {
            select = select.filter(app_instance::Column::ServerId.eq(server_id));
        }
        if let Some(q) = filter.q.as_deref().filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", escape_sql_like_pattern(q));
            select = select.filter(
                Condition::any()
                    .add(app_instance::Column::InstanceName.like(&pattern))
                    .add(app_instance::Column::AppType.like(&pattern))
                    .add(app_instance::Column::Version.like(&pattern)),
            );
        }
        if let Some(tag_name) = filter.tag.as_deref().filter(|t| !t.is_empty()) {
            let Some(tag_row) = tag::Entity::find()
                .filter(tag::Column::Name.eq(tag_name))
                .one(self.db())
                .await?
            else {
                return Ok(Vec::new());
            };
            // Own tags or tags inherited from the group
            select = select.filter(
                Condition::any()
                    .add(
                        app_instance::Column::Id.in_subquery(
                            instance_tag::Entity::find()
                                .select_only()
                                .column(instance_tag::Column::InstanceId)
                                .filter(instance_tag::Column::TagId.eq(tag_row.id))
                                .into_query(),
                        ),
                    )
                    .add(
                        app_instance::Column::GroupId.in_subquery(
                            group_tag::Entity::find()
                                .select_only()
                                .column(group_tag::Column::GroupId)
                                .filter(group_tag::Column::TagId.eq(tag_row.id))
                                .into_query(),
                        ),
                    ),
            );
        }
        Ok(select
            .order_by_asc(app_instance::Column::ServerId)
            .order_by_asc(app_instance::Column::InstanceName)
            .all(self.db())
            .await?)
    }

    async fn instance_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<app_instance::Model>> {
        Ok(app_instance::Entity::find_by_id(id).one(self.db()).await?)
    }

    async fn instance_find_by_ids(
        &self,
        ids: &[i64],
    ) -> anyhow::Result<Vec<app_instance::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(app_instance::Entity::find()
            .filter(app_instance::Column::Id.is_in(ids.to_vec()))
            .all(self.db())
            .await?)
    }

    async fn instance_detail(
        &self,
        id: i64,
        event_limit: u64,
    ) -> anyhow::Result<Option<InstanceDetail>> {
        let Some(instance) = self.instance_find_by_id(id).await? else {
            return Ok(None);
        };
        let tags = self.tags_for_instance(id).await?;
        let group_tags = match instance.group_id {
            Some(group_id) => self.tags_for_group(group_id).await?,
            None => Vec::new(),
        };
        let mappings = self.mapping_find_for_application(id).await?;
        let events = self.events_recent(id, event_limit).await?;
        Ok(Some(InstanceDetail {
            instance,
            tags,
            group_tags,
            mappings,
            events,
        }))
    }

    async fn instance_find_by_server(
        &self,
        server_id: i64,
    ) -> anyhow::Result<Vec<app_instance::Model>> {
        Ok(app_instance::Entity::find()
            .filter(app_instance::Column::ServerId.eq(server_id))
            .all(self.db())
            .await?)
    }

    async fn instance_find_candidates_by_ip(
        &self,
        ip: &str,
    ) -> anyhow::Result<Vec<MappingCandidate>> {
        let servers_with_ip: Vec<server::Model> = server::Entity::find()
            .filter(server::Column::Ip.eq(ip))
            .all(self.db())
            .await?;
        let server_ids: Vec<i64> = servers_with_ip.iter().map(|s| s.id).collect();

        let mut condition = Condition::any().add(app_instance::Column::Ip.eq(ip));
        if !server_ids.is_empty() {
            condition = condition.add(
                Condition::all()
                    .add(app_instance::Column::Ip.is_null())
                    .add(app_instance::Column::ServerId.is_in(server_ids.clone())),
            );
        }
        let instances = app_instance::Entity::find()
            .filter(app_instance::Column::DeletedAt.is_null())
            .filter(condition)
            .order_by_asc(app_instance::Column::Id)
            .all(self.db())
            .await?;
        if instances.is_empty() {
            return Ok(Vec::new());
        }

        let needed: Vec<i64> = instances.iter().map(|i| i.server_id).collect();
        let servers = server::Entity::find()
            .filter(server::Column::Id.is_in(needed))
            .all(self.db())
            .await?;
        let candidates = instances
            .into_iter()
            .map(|instance| {
                let server_name = servers
                    .iter()
                    .find(|s| s.id == instance.server_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                MappingCandidate {
                    application_id: instance.id,
                    server_name,
                    instance_name: instance.instance_name,
                    ip: instance.ip,
                    port: instance.port,
                }
            })
            .collect();
        Ok(candidates)
    }

    async fn instance_update_playbook(
        &self,
        id: i64,
        playbook: Option<&str>,
    ) -> anyhow::Result<bool> {
        let result = app_instance::Entity::update_many()
            .col_expr(
                app_instance::Column::CustomPlaybook,
                Expr::value(playbook.map(str::to_string)),
            )
            .filter(app_instance::Column::Id.eq(id))
            .filter(app_instance::Column::DeletedAt.is_null())
            .exec(self.db())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn apply_instance_delta(
        &self,
        server_id: i64,
        delta: &InstanceDelta,
        now: NaiveDateTime,
    ) -> anyhow::Result<AppliedInstances> {
        let txn = self.db().begin().await?;
        let mut applied = AppliedInstances::default();

        for observed in &delta.creates {
            let mut model = observed_fields(observed, now);
            model.id = NotSet;
            model.server_id = Set(server_id);
            model.instance_name = Set(observed.instance_name.clone());
            model.app_type = Set(observed.app_type.clone());
            model.catalog_id = Set(None);
            model.group_id = Set(None);
            model.custom_playbook = Set(None);
            model.custom_distr_url = Set(None);
            model.deleted_at = Set(None);
            model.created_at = Set(now);
            let inserted = model.insert(&txn).await?;
            applied.created_ids.push(inserted.id);
        }

        for update in &delta.updates {
            let mut model = observed_fields(&update.observed, now);
            model.id = Set(update.id);
            if update.revive {
                model.deleted_at = Set(None);
            }
            app_instance::Entity::update(model).exec(&txn).await?;

            if update.endpoint_changed {
                applied.endpoint_changed_ids.push(update.id);
            }
            for change in &update.changes {
                match change.field {
                    "version" => {
                        version_history::ActiveModel {
                            id: NotSet,
                            instance_id: Set(Some(update.id)),
                            old_version: Set(change.old.clone()),
                            new_version: Set(change.new.clone()),
                            changed_by: Set(Some("agent".to_string())),
                            reason: Set(Some("observed".to_string())),
                            changed_at: Set(now),
                        }
                        .insert(&txn)
                        .await?;
                    }
                    "status" => {
                        insert_event(
                            &txn,
                            update.id,
                            "status_changed",
                            format!(
                                "{} -> {}",
                                change.old.as_deref().unwrap_or("unknown"),
                                change.new.as_deref().unwrap_or("unknown")
                            ),
                            now,
                        )
                        .await?;
                    }
                    _ => {
                        insert_event(
                            &txn,
                            update.id,
                            "container_changed",
                            format!(
                                "{}: {} -> {}",
                                change.field,
                                change.old.as_deref().unwrap_or("none"),
                                change.new.as_deref().unwrap_or("none")
                            ),
                            now,
                        )
                        .await?;
                    }
                }
            }
        }

        if !delta.tombstone_ids.is_empty() {
            app_instance::Entity::update_many()
                .col_expr(app_instance::Column::DeletedAt, Expr::value(Some(now)))
                .col_expr(app_instance::Column::UpdatedAt, Expr::value(now))
                .filter(app_instance::Column::Id.is_in(delta.tombstone_ids.clone()))
                .filter(app_instance::Column::DeletedAt.is_null())
                .exec(&txn)
                .await?;
            applied.tombstoned_ids = delta.tombstone_ids.clone();
        }

        txn.commit().await?;
        Ok(applied)
    }

    async fn instance_find_plan_targets(&self, ids: &[i64]) -> anyhow::Result<Vec<PlanTarget>> {
        let instances = self.instance_find_by_ids(ids).await?;
        if instances.is_empty() {
            return Ok(Vec::new());
        }

        let group_ids: Vec<i64> = instances.iter().filter_map(|i| i.group_id).collect();
        let groups: Vec<app_group::Model> = if group_ids.is_empty() {
            Vec::new()
        } else {
            app_group::Entity::find()
                .filter(app_group::Column::Id.is_in(group_ids))
                .all(self.db())
                .await?
        };

        let instance_ids: Vec<i64> = instances.iter().map(|i| i.id).collect();
        let links: Vec<instance_tag::Model> = instance_tag::Entity::find()
            .filter(instance_tag::Column::InstanceId.is_in(instance_ids))
            .all(self.db())
            .await?;
        let system_tags: Vec<tag::Model> = if links.is_empty() {
            Vec::new()
        } else {
            tag::Entity::find()
                .filter(tag::Column::Id.is_in(links.iter().map(|l| l.tag_id).collect::<Vec<_>>()))
                .filter(tag::Column::IsSystem.eq(true))
                .all(self.db())
                .await?
        };

        let targets = instances
            .into_iter()
            .map(|instance| {
                let batch_grouping = instance
                    .group_id
                    .and_then(|gid| groups.iter().find(|g| g.id == gid))
                    .map(|g| {
                        BatchGrouping::from_str(&g.batch_grouping).unwrap_or_default()
                    })
                    .unwrap_or_default();
                let locks = links
                    .iter()
                    .filter(|l| l.instance_id == instance.id)
                    .filter_map(|l| system_tags.iter().find(|t| t.id == l.tag_id))
                    .map(|t| t.name.clone())
                    .collect();
                PlanTarget {
                    id: instance.id,
                    server_id: instance.server_id,
                    instance_name: instance.instance_name,
                    app_type: instance.app_type,
                    status: instance.status,
                    deleted: instance.deleted_at.is_some(),
                    group_id: instance.group_id,
                    batch_grouping,
                    locks,
                }
            })
            .collect();
        Ok(targets)
    }

    async fn instance_purge_tombstoned(&self, cutoff: NaiveDateTime) -> anyhow::Result<u64> {
        let result = app_instance::Entity::delete_many()
            .filter(app_instance::Column::DeletedAt.lt(cutoff))
            .filter(
                Expr::col((app_instance::Entity, app_instance::Column::Id)).not_in_subquery(
                    app_mapping::Entity::find()
                        .select_only()
                        .column(app_mapping::Column::ApplicationId)
                        .into_query(),
                ),
            )
            .exec(self.db())
            .await?;
        Ok(result.rows_affected)
    }
}
