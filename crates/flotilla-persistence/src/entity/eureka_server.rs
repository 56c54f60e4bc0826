//! Eureka server entity - one polled registry endpoint

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "eureka_servers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub server_id: Option<i64>,
    #[sea_orm(unique)]
    pub url: String,
    pub last_seen: Option<DateTime>,
    pub removed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
