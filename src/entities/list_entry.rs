//! List entry entity - Backing rows for [`crate::store::SqlListQueue`].
//!
//! Each row is one element of an ordered, append-only list identified by `list_key`.
//! Insertion order (the auto-increment `id`) is list order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// List entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "list_entries")]
pub struct Model {
    /// Monotonic insertion id, defines ordering within a list
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the list this entry belongs to
    pub list_key: String,
    /// Opaque entry payload
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
