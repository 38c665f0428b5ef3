//! Proof entity - A user-submitted attachment awaiting, or past, staff review.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review state of a proof submission.
///
/// Only `Pending` can change; `Approved` and `Rejected` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ProofStatus {
    /// Waiting for a reviewer
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Accepted; points were awarded
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Declined; no points
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Proof submission database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proofs")]
pub struct Model {
    /// Discord message ID of the submission
    #[sea_orm(primary_key, auto_increment = false)]
    pub submission_id: String,
    /// Discord user ID of the submitter
    pub user_id: String,
    /// Channel the submission was posted in
    pub channel_id: String,
    /// URL of the first attachment, kept so reviewers can see it
    pub attachment_url: Option<String>,
    /// Review state
    pub status: ProofStatus,
    /// Message in the staff channel carrying the review buttons
    pub review_message_id: Option<String>,
    /// Discord user ID of whoever decided
    pub reviewer_id: Option<String>,
    /// When the proof arrived
    pub submitted_at: DateTimeUtc,
    /// When a reviewer decided
    pub decided_at: Option<DateTimeUtc>,
}

/// Proofs have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
