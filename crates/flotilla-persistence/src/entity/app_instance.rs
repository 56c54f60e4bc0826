//! Application instance entity - one deployment of an application on one server
//!
//! The `(server_id, instance_name, app_type)` triple is the natural key.
//! A row with `deleted_at` set is a tombstone: retained for history and
//! revived in place (same id) if the instance reappears.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "app_instances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub server_id: i64,
    pub instance_name: String,
    pub app_type: String,
    pub catalog_id: Option<i64>,
    pub group_id: Option<i64>,
    pub status: String,
    pub version: Option<String>,
    pub pid: Option<i64>,
    pub start_time: Option<DateTime>,
    pub ip: Option<String>,
    pub port: Option<i32>,
    pub app_path: Option<String>,
    pub log_path: Option<String>,
    pub container_id: Option<String>,
    pub container_image: Option<String>,
    pub container_tag: Option<String>,
    pub eureka_registered: bool,
    pub eureka_url: Option<String>,
    pub custom_playbook: Option<String>,
    pub custom_distr_url: Option<String>,
    pub last_seen: Option<DateTime>,
    pub deleted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// A live row has no tombstone
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// The `(server, instance_name, app_type)` identity triple
    pub fn natural_key(&self) -> (i64, &str, &str) {
        (self.server_id, self.instance_name.as_str(), self.app_type.as_str())
    }
}
