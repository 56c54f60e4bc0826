//! Task entity - a unit of imperative work
//!
//! Status transitions are monotone: pending -> running ->
//! completed | failed | cancelled. No backwards transition is persisted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// start | stop | restart | update | drain | custom
    pub task_type: String,
    /// pending | running | completed | failed | cancelled
    pub status: String,
    /// JSON parameter bundle
    pub params: String,
    pub server_id: Option<i64>,
    pub instance_id: Option<i64>,
    /// Shared by all tasks created from one idempotent submit
    pub idempotency_key: Option<String>,
    pub created_at: DateTime,
    pub started_at: Option<DateTime>,
    pub completed_at: Option<DateTime>,
    pub result: Option<String>,
    pub error: Option<String>,
    /// Structured progress JSON (closed phase variants)
    pub progress: Option<String>,
    /// OS process of the external runner, when one is executing
    pub runner_pid: Option<i64>,
    pub cancelled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
