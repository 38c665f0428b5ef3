//! Points ledger - The authoritative mapping from account to point total.
//!
//! Every mutation runs inside a database transaction taken under a single-writer
//! lock, so a change is either fully persisted before the call returns or not
//! applied at all. Totals never go below zero: each step clamps, not just the
//! final result.

use crate::{
    core::system_state::{self, LAST_RESET_KEY},
    entities::{Balance, balance},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};

/// A request to move an account's total up or down.
///
/// The carried amount is the magnitude and must be positive for either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// Add points
    Add(i64),
    /// Remove points, stopping at zero
    Remove(i64),
}

impl Adjustment {
    /// The magnitude of the adjustment as given.
    #[must_use]
    pub const fn amount(self) -> i64 {
        match self {
            Self::Add(amount) | Self::Remove(amount) => amount,
        }
    }

    /// The signed change, or `InvalidAmount` when the magnitude is not positive.
    pub fn delta(self) -> Result<i64> {
        match self {
            Self::Add(amount) if amount > 0 => Ok(amount),
            Self::Remove(amount) if amount > 0 => Ok(-amount),
            Self::Add(amount) | Self::Remove(amount) => Err(Error::InvalidAmount { amount }),
        }
    }
}

/// One account's total as seen by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    /// Discord user ID
    pub account_id: String,
    /// Point total
    pub points: i64,
}

/// Read-only copy of every balance, in the order accounts first received points.
///
/// Later ledger mutations are not reflected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    balances: Vec<AccountBalance>,
}

impl Snapshot {
    /// Builds a snapshot from balances already in iteration order.
    #[must_use]
    pub const fn new(balances: Vec<AccountBalance>) -> Self {
        Self { balances }
    }

    /// Iterates balances in snapshot order.
    pub fn iter(&self) -> std::slice::Iter<'_, AccountBalance> {
        self.balances.iter()
    }

    /// Number of accounts with a recorded balance.
    #[must_use]
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// True when no account has a recorded balance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Total for one account, if it has a row.
    #[must_use]
    pub fn points_of(&self, account_id: &str) -> Option<i64> {
        self.balances
            .iter()
            .find(|b| b.account_id == account_id)
            .map(|b| b.points)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a AccountBalance;
    type IntoIter = std::slice::Iter<'a, AccountBalance>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

const fn clamped_total(current: i64, delta: i64) -> i64 {
    let total = current.saturating_add(delta);
    if total < 0 { 0 } else { total }
}

/// Owner of all point balances.
#[derive(Debug)]
pub struct Ledger {
    db: DatabaseConnection,
    writer: Mutex<()>,
}

impl Ledger {
    /// Creates a ledger over an initialized database.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            writer: Mutex::new(()),
        }
    }

    /// The connection this ledger persists to, for read-only collaborators.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Opens a write transaction. Other writers wait until it is committed or
    /// dropped; dropping it without `commit` rolls everything back.
    pub async fn begin(&self) -> Result<LedgerTransaction<'_>> {
        let guard = self.writer.lock().await;
        let txn = self.db.begin().await?;
        Ok(LedgerTransaction {
            _writer: guard,
            txn,
        })
    }

    /// Applies `adjustment` to `account_id` and persists it. Returns the new total.
    #[instrument(skip(self))]
    pub async fn adjust(&self, account_id: &str, adjustment: Adjustment) -> Result<i64> {
        // Validate before taking the lock so bad input never opens a transaction
        adjustment.delta()?;

        let txn = self.begin().await?;
        let points = txn.adjust(account_id, adjustment).await?;
        txn.commit().await?;

        info!("Adjusted {} by {:?}, total now {}", account_id, adjustment, points);
        Ok(points)
    }

    /// Clears every balance and records `now` as the last reset, in one
    /// transaction. Returns how many accounts were cleared.
    #[instrument(skip(self))]
    pub async fn reset(&self, now: DateTime<Utc>) -> Result<u64> {
        let txn = self.begin().await?;
        let cleared = txn.clear().await?;
        system_state::set_value(txn.connection(), LAST_RESET_KEY, &now.to_rfc3339()).await?;
        txn.commit().await?;

        info!("Ranking reset at {}, {} balances cleared", now, cleared);
        Ok(cleared)
    }

    /// Copies every balance in insertion order.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let rows = Balance::find()
            .order_by_asc(balance::Column::Id)
            .all(&self.db)
            .await?;

        Ok(Snapshot::new(
            rows.into_iter()
                .map(|row| AccountBalance {
                    account_id: row.account_id,
                    points: row.points,
                })
                .collect(),
        ))
    }

    /// Current total for one account; accounts without a row have zero.
    pub async fn balance(&self, account_id: &str) -> Result<i64> {
        let row = Balance::find()
            .filter(balance::Column::AccountId.eq(account_id))
            .one(&self.db)
            .await?;
        Ok(row.map_or(0, |r| r.points))
    }
}

/// An open ledger write. Holds the writer lock for its whole lifetime.
pub struct LedgerTransaction<'a> {
    _writer: MutexGuard<'a, ()>,
    txn: DatabaseTransaction,
}

impl LedgerTransaction<'_> {
    /// The underlying transaction, for writes that must commit together with
    /// a balance change.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Applies `adjustment` inside this transaction and returns the new total.
    pub async fn adjust(&self, account_id: &str, adjustment: Adjustment) -> Result<i64> {
        let delta = adjustment.delta()?;
        let now = Utc::now();

        let existing = Balance::find()
            .filter(balance::Column::AccountId.eq(account_id))
            .one(&self.txn)
            .await?;

        if let Some(row) = existing {
            let points = clamped_total(row.points, delta);
            let mut active_model: balance::ActiveModel = row.into();
            active_model.points = Set(points);
            active_model.updated_at = Set(now);
            active_model.update(&self.txn).await?;
            Ok(points)
        } else {
            let points = clamped_total(0, delta);
            let new_balance = balance::ActiveModel {
                account_id: Set(account_id.to_string()),
                points: Set(points),
                updated_at: Set(now),
                ..Default::default()
            };
            new_balance.insert(&self.txn).await?;
            Ok(points)
        }
    }

    /// Awards the fixed proof value inside this transaction.
    pub async fn record_approval(&self, account_id: &str, award: i64) -> Result<i64> {
        self.adjust(account_id, Adjustment::Add(award)).await
    }

    /// Deletes every balance inside this transaction.
    pub async fn clear(&self) -> Result<u64> {
        let result = Balance::delete_many().exec(&self.txn).await?;
        Ok(result.rows_affected)
    }

    /// Makes the changes durable and releases the writer lock.
    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }
}
