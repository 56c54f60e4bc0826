//! Eureka instance status history entity - append-only

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "eureka_status_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub eureka_instance_id: Option<i64>,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
