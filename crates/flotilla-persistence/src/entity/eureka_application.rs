//! Eureka application entity - one registered application name

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "eureka_applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub eureka_server_id: i64,
    pub name: String,
    pub last_seen: Option<DateTime>,
    pub removed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
