//! Eureka instance entity - one registered service instance
//!
//! `instance_id` is the natural key within its application.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "eureka_instances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub eureka_application_id: i64,
    pub instance_id: String,
    pub hostname: Option<String>,
    pub ip: String,
    pub port: Option<i32>,
    /// UP | DOWN | STARTING | OUT_OF_SERVICE | UNKNOWN
    pub status: String,
    pub last_heartbeat: Option<DateTime>,
    /// Registry metadata as JSON
    pub metadata: Option<String>,
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
