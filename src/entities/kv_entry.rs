//! Key-value entry entity - one JSON document per fixed storage key.
//!
//! The local cache keeps each collection (items, members) as a single JSON array
//! under its own key. `revision` increases on every write and `writer` records
//! which process made it, so other processes can notice foreign changes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Key-value database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "kv_entries")]
pub struct Model {
    /// Storage key (e.g. `grocesplit_items`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    /// Serialized JSON array
    #[sea_orm(column_type = "Text")]
    pub value: String,
    /// Monotonic per-key write counter
    pub revision: i64,
    /// Token of the process that wrote this revision
    pub writer: String,
    /// When this revision was written
    pub updated_at: ChronoDateTimeUtc,
}

/// Key-value entries stand alone
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
