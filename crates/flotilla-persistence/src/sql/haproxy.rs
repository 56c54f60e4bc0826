//! HaproxyPersistence implementation
//!
//! Delta application walks the three-level tree inside one transaction.
//! Tombstoning a backend or process tombstones everything below it so a live
//! member never dangles under a removed parent.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::Expr;
use sea_orm::*;

use super::ExternalDbPersistService;
use crate::entity::{
    app_mapping, haproxy_backend, haproxy_instance, haproxy_server, haproxy_status_history,
};
use crate::model::{
    AppliedHaproxy, BackendSummary, HaproxyBackendCreate, HaproxyDelta, HaproxyServerObservation,
    MappingEntityType,
};
use crate::traits::HaproxyPersistence;

fn server_fields(
    observed: &HaproxyServerObservation,
    now: NaiveDateTime,
) -> haproxy_server::ActiveModel {
    haproxy_server::ActiveModel {
        ip: Set(observed.ip.clone()),
        port: Set(observed.port),
        status: Set(observed.status.clone()),
        weight: Set(observed.weight),
        current_sessions: Set(observed.current_sessions),
        max_sessions: Set(observed.max_sessions),
        last_state_change_seconds: Set(observed.last_state_change_seconds),
        last_seen: Set(Some(now)),
        updated_at: Set(now),
        ..Default::default()
    }
}

async fn insert_status_history(
    txn: &DatabaseTransaction,
    server_id: i64,
    old_status: Option<&str>,
    new_status: &str,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    haproxy_status_history::ActiveModel {
        id: NotSet,
        haproxy_server_id: Set(Some(server_id)),
        old_status: Set(old_status.map(str::to_string)),
        new_status: Set(new_status.to_string()),
        changed_at: Set(now),
    }
    .insert(txn)
    .await?;
    Ok(())
}

/// Insert a whole new backend with its members, returning the new member ids
async fn insert_backend_tree(
    txn: &DatabaseTransaction,
    haproxy_instance_id: i64,
    create: &HaproxyBackendCreate,
    now: NaiveDateTime,
) -> anyhow::Result<Vec<i64>> {
    let backend = haproxy_backend::ActiveModel {
        id: NotSet,
        haproxy_instance_id: Set(haproxy_instance_id),
        name: Set(create.name.clone()),
        last_seen: Set(Some(now)),
        removed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(txn)
    .await?;

    let mut created = Vec::with_capacity(create.servers.len());
    for observed in &create.servers {
        let mut model = server_fields(observed, now);
        model.id = NotSet;
        model.backend_id = Set(backend.id);
        model.name = Set(observed.name.clone());
        model.removed_at = Set(None);
        model.created_at = Set(now);
        let inserted = model.insert(txn).await?;
        insert_status_history(txn, inserted.id, None, &observed.status, now).await?;
        created.push(inserted.id);
    }
    Ok(created)
}

/// Tombstone all live members under the given backends, returning their ids
async fn tombstone_servers_under(
    txn: &DatabaseTransaction,
    backend_ids: &[i64],
    now: NaiveDateTime,
) -> anyhow::Result<Vec<i64>> {
    if backend_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = haproxy_server::Entity::find()
        .select_only()
        .column(haproxy_server::Column::Id)
        .filter(haproxy_server::Column::BackendId.is_in(backend_ids.to_vec()))
        .filter(haproxy_server::Column::RemovedAt.is_null())
        .into_tuple()
        .all(txn)
        .await?;
    if !ids.is_empty() {
        haproxy_server::Entity::update_many()
            .col_expr(haproxy_server::Column::RemovedAt, Expr::value(Some(now)))
            .col_expr(haproxy_server::Column::UpdatedAt, Expr::value(now))
            .filter(haproxy_server::Column::Id.is_in(ids.clone()))
            .exec(txn)
            .await?;
    }
    Ok(ids)
}

#[async_trait]
impl HaproxyPersistence for ExternalDbPersistService {
    async fn haproxy_list_instances(&self) -> anyhow::Result<Vec<haproxy_instance::Model>> {
        Ok(haproxy_instance::Entity::find()
            .filter(haproxy_instance::Column::RemovedAt.is_null())
            .order_by_asc(haproxy_instance::Column::ServerId)
            .order_by_asc(haproxy_instance::Column::Name)
            .all(self.db())
            .await?)
    }

    async fn haproxy_backends_with_counts(
        &self,
        haproxy_instance_id: i64,
    ) -> anyhow::Result<Vec<BackendSummary>> {
        let backends = haproxy_backend::Entity::find()
            .filter(haproxy_backend::Column::HaproxyInstanceId.eq(haproxy_instance_id))
            .filter(haproxy_backend::Column::RemovedAt.is_null())
            .order_by_asc(haproxy_backend::Column::Name)
            .all(self.db())
            .await?;
        if backends.is_empty() {
            return Ok(Vec::new());
        }
        let servers = haproxy_server::Entity::find()
            .filter(
                haproxy_server::Column::BackendId
                    .is_in(backends.iter().map(|b| b.id).collect::<Vec<_>>()),
            )
            .filter(haproxy_server::Column::RemovedAt.is_null())
            .all(self.db())
            .await?;

        let summaries = backends
            .into_iter()
            .map(|backend| {
                let backend_id = backend.id;
                let mut summary = BackendSummary {
                    backend,
                    up: 0,
                    down: 0,
                    maint: 0,
                    drain: 0,
                    unknown: 0,
                };
                for member in servers.iter().filter(|s| s.backend_id == backend_id) {
                    match member.status.as_str() {
                        "UP" => summary.up += 1,
                        "DOWN" => summary.down += 1,
                        "MAINT" => summary.maint += 1,
                        "DRAIN" => summary.drain += 1,
                        _ => summary.unknown += 1,
                    }
                }
                summary
            })
            .collect();
        Ok(summaries)
    }

    async fn haproxy_servers_for_backend(
        &self,
        backend_id: i64,
    ) -> anyhow::Result<Vec<haproxy_server::Model>> {
        Ok(haproxy_server::Entity::find()
            .filter(haproxy_server::Column::BackendId.eq(backend_id))
            .filter(haproxy_server::Column::RemovedAt.is_null())
            .order_by_asc(haproxy_server::Column::Name)
            .all(self.db())
            .await?)
    }

    async fn haproxy_server_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<haproxy_server::Model>> {
        Ok(haproxy_server::Entity::find_by_id(id).one(self.db()).await?)
    }

    async fn haproxy_backend_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<haproxy_backend::Model>> {
        Ok(haproxy_backend::Entity::find_by_id(id).one(self.db()).await?)
    }

    async fn haproxy_instance_find_by_id(
        &self,
        id: i64,
    ) -> anyhow::Result<Option<haproxy_instance::Model>> {
        Ok(haproxy_instance::Entity::find_by_id(id)
            .one(self.db())
            .await?)
    }

    async fn haproxy_find_tree_by_server(
        &self,
        server_id: i64,
    ) -> anyhow::Result<(
        Vec<haproxy_instance::Model>,
        Vec<haproxy_backend::Model>,
        Vec<haproxy_server::Model>,
    )> {
        let processes = haproxy_instance::Entity::find()
            .filter(haproxy_instance::Column::ServerId.eq(server_id))
            .all(self.db())
            .await?;
        if processes.is_empty() {
            return Ok((Vec::new(), Vec::new(), Vec::new()));
        }
        let backends = haproxy_backend::Entity::find()
            .filter(
                haproxy_backend::Column::HaproxyInstanceId
                    .is_in(processes.iter().map(|p| p.id).collect::<Vec<_>>()),
            )
            .all(self.db())
            .await?;
        let servers = if backends.is_empty() {
            Vec::new()
        } else {
            haproxy_server::Entity::find()
                .filter(
                    haproxy_server::Column::BackendId
                        .is_in(backends.iter().map(|b| b.id).collect::<Vec<_>>()),
                )
                .all(self.db())
                .await?
        };
        Ok((processes, backends, servers))
    }

    async fn apply_haproxy_delta(
        &self,
        server_id: i64,
        delta: &HaproxyDelta,
        now: NaiveDateTime,
    ) -> anyhow::Result<AppliedHaproxy> {
        let txn = self.db().begin().await?;
        let mut applied = AppliedHaproxy::default();

        for create in &delta.process_creates {
            let process = haproxy_instance::ActiveModel {
                id: NotSet,
                server_id: Set(server_id),
                name: Set(create.name.clone()),
                last_seen: Set(Some(now)),
                removed_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
            for backend in &create.backends {
                let ids = insert_backend_tree(&txn, process.id, backend, now).await?;
                applied.created_server_ids.extend(ids);
            }
        }

        for update in &delta.process_updates {
            haproxy_instance::ActiveModel {
                id: Set(update.id),
                last_seen: Set(Some(now)),
                removed_at: if update.revive { Set(None) } else { NotSet },
                updated_at: Set(now),
                ..Default::default()
            }
            .update(&txn)
            .await?;

            for backend in &update.backend_creates {
                let ids = insert_backend_tree(&txn, update.id, backend, now).await?;
                applied.created_server_ids.extend(ids);
            }

            for backend_update in &update.backend_updates {
                haproxy_backend::ActiveModel {
                    id: Set(backend_update.id),
                    last_seen: Set(Some(now)),
                    removed_at: if backend_update.revive { Set(None) } else { NotSet },
                    updated_at: Set(now),
                    ..Default::default()
                }
                .update(&txn)
                .await?;

                for observed in &backend_update.server_creates {
                    let mut model = server_fields(observed, now);
                    model.id = NotSet;
                    model.backend_id = Set(backend_update.id);
                    model.name = Set(observed.name.clone());
                    model.removed_at = Set(None);
                    model.created_at = Set(now);
                    let inserted = model.insert(&txn).await?;
                    insert_status_history(&txn, inserted.id, None, &observed.status, now).await?;
                    applied.created_server_ids.push(inserted.id);
                }

                for server_update in &backend_update.server_updates {
                    let mut model = server_fields(&server_update.observed, now);
                    model.id = Set(server_update.id);
                    if server_update.revive {
                        model.removed_at = Set(None);
                    }
                    haproxy_server::Entity::update(model).exec(&txn).await?;
                    if let Some((old, new)) = &server_update.status_change {
                        insert_status_history(&txn, server_update.id, old.as_deref(), new, now)
                            .await?;
                    }
                }

                if !backend_update.server_tombstones.is_empty() {
                    haproxy_server::Entity::update_many()
                        .col_expr(haproxy_server::Column::RemovedAt, Expr::value(Some(now)))
                        .col_expr(haproxy_server::Column::UpdatedAt, Expr::value(now))
                        .filter(
                            haproxy_server::Column::Id
                                .is_in(backend_update.server_tombstones.clone()),
                        )
                        .filter(haproxy_server::Column::RemovedAt.is_null())
                        .exec(&txn)
                        .await?;
                    applied
                        .tombstoned_server_ids
                        .extend(backend_update.server_tombstones.iter().copied());
                }
            }

            if !update.backend_tombstones.is_empty() {
                let buried =
                    tombstone_servers_under(&txn, &update.backend_tombstones, now).await?;
                applied.tombstoned_server_ids.extend(buried);
                haproxy_backend::Entity::update_many()
                    .col_expr(haproxy_backend::Column::RemovedAt, Expr::value(Some(now)))
                    .col_expr(haproxy_backend::Column::UpdatedAt, Expr::value(now))
                    .filter(haproxy_backend::Column::Id.is_in(update.backend_tombstones.clone()))
                    .filter(haproxy_backend::Column::RemovedAt.is_null())
                    .exec(&txn)
                    .await?;
            }
        }

        if !delta.process_tombstones.is_empty() {
            let backend_ids: Vec<i64> = haproxy_backend::Entity::find()
                .select_only()
                .column(haproxy_backend::Column::Id)
                .filter(
                    haproxy_backend::Column::HaproxyInstanceId
                        .is_in(delta.process_tombstones.clone()),
                )
                .filter(haproxy_backend::Column::RemovedAt.is_null())
                .into_tuple()
                .all(&txn)
                .await?;
            let buried = tombstone_servers_under(&txn, &backend_ids, now).await?;
            applied.tombstoned_server_ids.extend(buried);
            if !backend_ids.is_empty() {
                haproxy_backend::Entity::update_many()
                    .col_expr(haproxy_backend::Column::RemovedAt, Expr::value(Some(now)))
                    .col_expr(haproxy_backend::Column::UpdatedAt, Expr::value(now))
                    .filter(haproxy_backend::Column::Id.is_in(backend_ids))
                    .exec(&txn)
                    .await?;
            }
            haproxy_instance::Entity::update_many()
                .col_expr(haproxy_instance::Column::RemovedAt, Expr::value(Some(now)))
                .col_expr(haproxy_instance::Column::UpdatedAt, Expr::value(now))
                .filter(haproxy_instance::Column::Id.is_in(delta.process_tombstones.clone()))
                .filter(haproxy_instance::Column::RemovedAt.is_null())
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(applied)
    }

    async fn haproxy_server_sessions(&self, id: i64) -> anyhow::Result<Option<i64>> {
        let server = haproxy_server::Entity::find_by_id(id).one(self.db()).await?;
        Ok(server.and_then(|s| s.current_sessions))
    }

    async fn haproxy_purge_tombstoned(&self, cutoff: NaiveDateTime) -> anyhow::Result<u64> {
        // Members first so backends and processes never lose children to
        // cascades while still referenced by a mapping.
        let mapped = app_mapping::Entity::find()
            .select_only()
            .column(app_mapping::Column::EntityId)
            .filter(
                app_mapping::Column::EntityType.eq(MappingEntityType::HaproxyServer.as_str()),
            )
            .into_query();
        let servers = haproxy_server::Entity::delete_many()
            .filter(haproxy_server::Column::RemovedAt.lt(cutoff))
            .filter(
                Expr::col((haproxy_server::Entity, haproxy_server::Column::Id))
                    .not_in_subquery(mapped),
            )
            .exec(self.db())
            .await?;

        let empty_backends: Vec<i64> = haproxy_backend::Entity::find()
            .select_only()
            .column(haproxy_backend::Column::Id)
            .filter(haproxy_backend::Column::RemovedAt.lt(cutoff))
            .filter(
                Expr::col((haproxy_backend::Entity, haproxy_backend::Column::Id))
                    .not_in_subquery(
                        haproxy_server::Entity::find()
                            .select_only()
                            .column(haproxy_server::Column::BackendId)
                            .into_query(),
                    ),
            )
            .into_tuple()
            .all(self.db())
            .await?;
        let mut purged = servers.rows_affected;
        if !empty_backends.is_empty() {
            let backends = haproxy_backend::Entity::delete_many()
                .filter(haproxy_backend::Column::Id.is_in(empty_backends))
                .exec(self.db())
                .await?;
            purged += backends.rows_affected;
        }

        let empty_processes: Vec<i64> = haproxy_instance::Entity::find()
            .select_only()
            .column(haproxy_instance::Column::Id)
            .filter(haproxy_instance::Column::RemovedAt.lt(cutoff))
            .filter(
                Expr::col((haproxy_instance::Entity, haproxy_instance::Column::Id))
                    .not_in_subquery(
                        haproxy_backend::Entity::find()
                            .select_only()
                            .column(haproxy_backend::Column::HaproxyInstanceId)
                            .into_query(),
                    ),
            )
            .into_tuple()
            .all(self.db())
            .await?;
        if !empty_processes.is_empty() {
            let processes = haproxy_instance::Entity::delete_many()
                .filter(haproxy_instance::Column::Id.is_in(empty_processes))
                .exec(self.db())
                .await?;
            purged += processes.rows_affected;
        }
        Ok(purged)
    }
}
