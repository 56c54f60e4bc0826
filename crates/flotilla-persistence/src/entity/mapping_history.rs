//! Mapping history entity - append-only
//!
//! Every create, change, or removal of a mapping appends a row here; a
//! mapping mutation without its history row is a bug. Rows reference entity
//! ids even across soft-delete so revival restores the graph.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "mapping_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub application_id: Option<i64>,
    /// haproxy_server | eureka_instance
    pub entity_type: String,
    pub entity_id: i64,
    /// created | changed | removed
    pub action: String,
    /// auto | manual | operator_unmap | entity_disappeared | ip_changed | ambiguous
    pub reason: String,
    pub actor: Option<String>,
    pub notes: Option<String>,
    pub changed_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
