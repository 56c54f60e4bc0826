//! TaskPersistence implementation
//!
//! Status transitions are conditional updates; a transition whose guard does
//! not match affects zero rows and reports false, so the monotone lifecycle
//! can never be violated by a racing writer.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::*;

use flotilla_common::utils::now_utc;

use super::ExternalDbPersistService;
use crate::entity::task;
use crate::model::{NewTask, TaskFilter, TaskStatus};
use crate::traits::TaskPersistence;

#[async_trait]
impl TaskPersistence for ExternalDbPersistService {
    async fn task_create_batch(&self, tasks: &[NewTask]) -> anyhow::Result<Vec<i64>> {
        let txn = self.db().begin().await?;
        let now = now_utc();
        let mut ids = Vec::with_capacity(tasks.len());
        for new_task in tasks {
            let model = task::ActiveModel {
                id: NotSet,
                task_type: Set(new_task.task_type.as_str().to_string()),
                status: Set(TaskStatus::Pending.as_str().to_string()),
                params: Set(new_task.params.clone()),
                server_id: Set(new_task.server_id),
                instance_id: Set(new_task.instance_id),
                idempotency_key: Set(new_task.idempotency_key.clone()),
                created_at: Set(now),
                started_at: Set(None),
                completed_at: Set(None),
                result: Set(None),
                error: Set(None),
                progress: Set(None),
                runner_pid: Set(None),
                cancelled: Set(false),
            }
            .insert(&txn)
            .await?;
            ids.push(model.id);
        }
        txn.commit().await?;
        Ok(ids)
    }

    async fn task_find_by_id(&self, id: i64) -> anyhow::Result<Option<task::Model>> {
        Ok(task::Entity::find_by_id(id).one(self.db()).await?)
    }

    async fn task_query(&self, filter: &TaskFilter) -> anyhow::Result<Vec<task::Model>> {
        let mut select = task::Entity::find();
        if let Some(status) = filter.status {
            select = select.filter(task::Column::Status.eq(status.as_str()));
        }
        if let Some(task_type) = filter.task_type {
            select = select.filter(task::Column::TaskType.eq(task_type.as_str()));
        }
        Ok(select
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .limit(filter.limit.unwrap_or(100))
            .all(self.db())
            .await?)
    }

    async fn task_find_pending(&self, limit: u64) -> anyhow::Result<Vec<task::Model>> {
        Ok(task::Entity::find()
            .filter(task::Column::Status.eq(TaskStatus::Pending.as_str()))
            .order_by_asc(task::Column::CreatedAt)
            .order_by_asc(task::Column::Id)
            .limit(limit)
            .all(self.db())
            .await?)
    }

    async fn task_find_by_idempotency_key(
        &self,
        key: &str,
    ) -> anyhow::Result<Vec<task::Model>> {
        Ok(task::Entity::find()
            .filter(task::Column::IdempotencyKey.eq(key))
            .order_by_asc(task::Column::Id)
            .all(self.db())
            .await?)
    }

    async fn task_mark_running(&self, id: i64) -> anyhow::Result<bool> {
        let result = task::Entity::update_many()
            .col_expr(
                task::Column::Status,
                Expr::value(TaskStatus::Running.as_str()),
            )
            .col_expr(task::Column::StartedAt, Expr::value(Some(now_utc())))
            .filter(task::Column::Id.eq(id))
            .filter(task::Column::Status.eq(TaskStatus::Pending.as_str()))
            .filter(task::Column::Cancelled.eq(false))
            .exec(self.db())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn task_mark_completed(&self, id: i64, result: Option<&str>) -> anyhow::Result<bool> {
        let update = task::Entity::update_many()
            .col_expr(
                task::Column::Status,
                Expr::value(TaskStatus::Completed.as_str()),
            )
            .col_expr(task::Column::CompletedAt, Expr::value(Some(now_utc())))
            .col_expr(task::Column::Result, Expr::value(result.map(str::to_string)))
            .filter(task::Column::Id.eq(id))
            .filter(task::Column::Status.eq(TaskStatus::Running.as_str()))
            .exec(self.db())
            .await?;
        Ok(update.rows_affected > 0)
    }

    async fn task_mark_failed(&self, id: i64, error: &str) -> anyhow::Result<bool> {
        let update = task::Entity::update_many()
            .col_expr(
                task::Column::Status,
                Expr::value(TaskStatus::Failed.as_str()),
            )
            .col_expr(task::Column::CompletedAt, Expr::value(Some(now_utc())))
            .col_expr(task::Column::Error, Expr::value(Some(error.to_string())))
            .filter(task::Column::Id.eq(id))
            .filter(task::Column::Status.eq(TaskStatus::Running.as_str()))
            .exec(self.db())
            .await?;
        Ok(update.rows_affected > 0)
    }

    async fn task_mark_cancelled(&self, id: i64) -> anyhow::Result<bool> {
        let update = task::Entity::update_many()
            .col_expr(
                task::Column::Status,
                Expr::value(TaskStatus::Cancelled.as_str()),
            )
            .col_expr(task::Column::Cancelled, Expr::value(true))
            .col_expr(task::Column::CompletedAt, Expr::value(Some(now_utc())))
            .filter(task::Column::Id.eq(id))
            .filter(task::Column::Status.is_in(vec![
                TaskStatus::Pending.as_str(),
                TaskStatus::Running.as_str(),
            ]))
            .exec(self.db())
            .await?;
        Ok(update.rows_affected > 0)
    }

    async fn task_set_cancel_flag(&self, id: i64) -> anyhow::Result<Option<task::Model>> {
        task::Entity::update_many()
            .col_expr(task::Column::Cancelled, Expr::value(true))
            .filter(task::Column::Id.eq(id))
            .exec(self.db())
            .await?;
        self.task_find_by_id(id).await
    }

    async fn task_update_progress(&self, id: i64, progress: &str) -> anyhow::Result<bool> {
        let update = task::Entity::update_many()
            .col_expr(
                task::Column::Progress,
                Expr::value(Some(progress.to_string())),
            )
            .filter(task::Column::Id.eq(id))
            .filter(task::Column::Status.eq(TaskStatus::Running.as_str()))
            .exec(self.db())
            .await?;
        Ok(update.rows_affected > 0)
    }

    async fn task_set_runner_pid(&self, id: i64, pid: Option<i64>) -> anyhow::Result<bool> {
        let update = task::Entity::update_many()
            .col_expr(task::Column::RunnerPid, Expr::value(pid))
            .filter(task::Column::Id.eq(id))
            .exec(self.db())
            .await?;
        Ok(update.rows_affected > 0)
    }
}
