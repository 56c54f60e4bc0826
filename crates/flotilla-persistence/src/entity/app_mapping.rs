//! Application mapping entity - link from an application instance to an
//! external entity (HAProxy server or Eureka instance)
//!
//! Unique per `(application_id, entity_type, entity_id)`. A mapping with
//! `is_manual` set survives reconciliation until an operator removes it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "app_mappings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: i64,
    /// haproxy_server | eureka_instance
    pub entity_type: String,
    pub entity_id: i64,
    pub is_manual: bool,
    pub mapped_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
