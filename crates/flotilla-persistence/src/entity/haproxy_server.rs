//! HAProxy server entity - one backend member
//!
//! Backend membership is part of identity: a member disappearing from one
//! backend and appearing in another is a delete plus a create, never a move.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "haproxy_servers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub backend_id: i64,
    pub name: String,
    pub ip: Option<String>,
    pub port: Option<i32>,
    /// Last seen HAProxy status: UP | DOWN | MAINT | DRAIN | UNKNOWN
    pub status: String,
    pub weight: Option<i32>,
    pub current_sessions: Option<i64>,
    pub max_sessions: Option<i64>,
    pub last_state_change_seconds: Option<i64>,
    pub last_seen: Option<DateTime>,
    pub removed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_live(&self) -> bool {
        self.removed_at.is_none()
    }
}
