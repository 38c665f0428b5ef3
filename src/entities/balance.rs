//! Balance entity - One row per account that has ever received points.
//!
//! The auto-increment `id` records first-insertion order, which is the order a
//! ledger snapshot iterates in and therefore the tie-break between equal totals.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Point balance database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "balances")]
pub struct Model {
    /// Insertion sequence
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Discord user ID of the account
    #[sea_orm(unique)]
    pub account_id: String,
    /// Current point total, never negative
    pub points: i64,
    /// When the total last changed
    pub updated_at: DateTimeUtc,
}

/// Balances have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
