//! System state entity - Bot bookkeeping that is not a balance.
//! Holds the canonical leaderboard message reference and the time of the last
//! ranking reset, one row per key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single bookkeeping value.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_state")]
pub struct Model {
    /// State key (e.g., `"leaderboard_message_id"`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    /// Value stored as string
    pub value: String,
    /// When this entry was last written
    pub updated_at: DateTimeUtc,
}

/// System state has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
