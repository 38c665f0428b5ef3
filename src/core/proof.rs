//! Proof review workflow - Submissions, staff decisions and the point award.
//!
//! A proof starts `pending` and is decided exactly once. Approving it awards the
//! fixed value in the same ledger transaction that records the decision, so a
//! proof can never be approved without its points or vice versa.

use crate::{
    core::ledger::Ledger,
    entities::{Proof, ProofStatus, proof},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use tracing::{info, instrument};

const CUSTOM_ID_PREFIX: &str = "proof";

/// A staff decision carried by a review button.
///
/// Button custom IDs look like `proof:approve:<submission id>` and are decoded
/// once, here, at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    /// Accept the proof and award points
    Approve(String),
    /// Decline the proof
    Reject(String),
}

impl ReviewAction {
    /// Decodes a button custom ID. Returns `None` for IDs this workflow does not own.
    #[must_use]
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.splitn(3, ':');
        if parts.next()? != CUSTOM_ID_PREFIX {
            return None;
        }
        let action = parts.next()?;
        let submission_id = parts.next().filter(|id| !id.is_empty())?.to_string();

        match action {
            "approve" => Some(Self::Approve(submission_id)),
            "reject" => Some(Self::Reject(submission_id)),
            _ => None,
        }
    }

    /// Encodes the action as a button custom ID.
    #[must_use]
    pub fn custom_id(&self) -> String {
        match self {
            Self::Approve(id) => format!("{CUSTOM_ID_PREFIX}:approve:{id}"),
            Self::Reject(id) => format!("{CUSTOM_ID_PREFIX}:reject:{id}"),
        }
    }

    /// The submission this action refers to.
    #[must_use]
    pub fn submission_id(&self) -> &str {
        match self {
            Self::Approve(id) | Self::Reject(id) => id,
        }
    }

    const fn target_status(&self) -> ProofStatus {
        match self {
            Self::Approve(_) => ProofStatus::Approved,
            Self::Reject(_) => ProofStatus::Rejected,
        }
    }
}

/// What a decision did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// The proof was approved and the submitter now has `new_total` points
    Approved {
        /// Submitter
        user_id: String,
        /// Submitter's total after the award
        new_total: i64,
    },
    /// The proof was rejected
    Rejected {
        /// Submitter
        user_id: String,
    },
    /// Someone already decided; nothing changed
    AlreadyProcessed {
        /// The earlier decision
        status: ProofStatus,
    },
    /// No proof with that submission ID exists
    Unknown,
}

impl DecisionOutcome {
    /// Text for the reviewer.
    #[must_use]
    pub fn reply_text(&self) -> String {
        match self {
            Self::Approved { user_id, new_total } => {
                format!("✅ Proof approved. <@{user_id}> now has {new_total} points.")
            }
            Self::Rejected { user_id } => format!("❌ Proof from <@{user_id}> rejected."),
            Self::AlreadyProcessed { .. } => "ℹ️ This proof was already processed.".to_string(),
            Self::Unknown => "⚠️ This proof is not known to the bot.".to_string(),
        }
    }

    /// True when the decision changed the standings.
    #[must_use]
    pub const fn changes_ranking(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

/// Details of a qualifying proof message.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    /// Discord message ID of the proof
    pub submission_id: String,
    /// Discord user ID of the author
    pub user_id: String,
    /// Channel the proof was posted in
    pub channel_id: String,
    /// URL of the first attachment
    pub attachment_url: Option<String>,
}

/// Stores a new pending proof.
///
/// Returns the stored proof and whether it was newly created; a redelivered
/// message leaves the existing record untouched.
#[instrument(skip(db))]
pub async fn record_submission(
    db: &DatabaseConnection,
    submission: NewSubmission,
) -> Result<(proof::Model, bool)> {
    if let Some(existing) = Proof::find_by_id(submission.submission_id.clone())
        .one(db)
        .await?
    {
        return Ok((existing, false));
    }

    let new_proof = proof::ActiveModel {
        submission_id: Set(submission.submission_id),
        user_id: Set(submission.user_id),
        channel_id: Set(submission.channel_id),
        attachment_url: Set(submission.attachment_url),
        status: Set(ProofStatus::Pending),
        review_message_id: Set(None),
        reviewer_id: Set(None),
        submitted_at: Set(Utc::now()),
        decided_at: Set(None),
    };
    let stored = new_proof.insert(db).await?;
    info!(
        "Recorded proof {} from {}",
        stored.submission_id, stored.user_id
    );
    Ok((stored, true))
}

/// Whether a proof still needs a review card in the staff channel.
///
/// True for pending proofs whose card was never posted, including a redelivered
/// submission whose earlier card post failed.
#[must_use]
pub fn awaiting_review_card(stored: &proof::Model) -> bool {
    stored.status == ProofStatus::Pending && stored.review_message_id.is_none()
}

/// Remembers which staff message carries the buttons for a proof.
pub async fn set_review_message(
    db: &DatabaseConnection,
    submission_id: &str,
    review_message_id: &str,
) -> Result<()> {
    let Some(existing) = Proof::find_by_id(submission_id.to_string()).one(db).await? else {
        return Ok(());
    };
    let mut active_model: proof::ActiveModel = existing.into();
    active_model.review_message_id = Set(Some(review_message_id.to_string()));
    active_model.update(db).await?;
    Ok(())
}

/// Looks up a proof by submission ID.
pub async fn get_proof(db: &DatabaseConnection, submission_id: &str) -> Result<Option<proof::Model>> {
    Proof::find_by_id(submission_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Applies a reviewer's decision.
///
/// Only a pending proof changes. Approval awards `award` points to the submitter
/// in the same transaction as the status change.
#[instrument(skip(ledger))]
pub async fn decide(
    ledger: &Ledger,
    action: &ReviewAction,
    reviewer_id: &str,
    award: i64,
) -> Result<DecisionOutcome> {
    let txn = ledger.begin().await?;

    let Some(existing) = Proof::find_by_id(action.submission_id().to_string())
        .one(txn.connection())
        .await?
    else {
        return Ok(DecisionOutcome::Unknown);
    };

    if existing.status != ProofStatus::Pending {
        return Ok(DecisionOutcome::AlreadyProcessed {
            status: existing.status,
        });
    }

    let user_id = existing.user_id.clone();
    let mut active_model: proof::ActiveModel = existing.into();
    active_model.status = Set(action.target_status());
    active_model.reviewer_id = Set(Some(reviewer_id.to_string()));
    active_model.decided_at = Set(Some(Utc::now()));
    active_model.update(txn.connection()).await?;

    let outcome = match action {
        ReviewAction::Approve(_) => {
            let new_total = txn.record_approval(&user_id, award).await?;
            DecisionOutcome::Approved { user_id, new_total }
        }
        ReviewAction::Reject(_) => DecisionOutcome::Rejected { user_id },
    };

    txn.commit().await?;
    info!(
        "Proof {} decided by {}: {:?}",
        action.submission_id(),
        reviewer_id,
        outcome
    );
    Ok(outcome)
}
