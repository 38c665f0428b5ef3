//! Leaderboard reconciliation - Standings, the canonical message, and rank badges.
//!
//! A reconciliation pass takes a ledger snapshot, orders it, publishes the top
//! entries to the single canonical leaderboard message, and brings the "Top K"
//! badge roles in line with the new order. The badge changes are computed as a
//! [`BadgePlan`] first and executed afterwards, one isolated call at a time.
//!
//! Discord itself sits behind the [`LeaderboardChannel`] and [`BadgeDirectory`]
//! traits so the whole pass runs against in-memory fakes in tests.

use crate::{
    core::{
        ledger::{Ledger, Snapshot},
        system_state::{self, LEADERBOARD_MESSAGE_KEY},
    },
    errors::{Error, Result},
};
use sea_orm::ConnectionTrait;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Write,
    future::Future,
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Discord role ID used as a rank badge.
pub type BadgeId = u64;

/// Discord message ID.
pub type MessageId = u64;

/// Title of the leaderboard post.
pub const LEADERBOARD_TITLE: &str = "🏆 Weekly Ranking";

/// Shown instead of an empty list.
pub const EMPTY_PLACEHOLDER: &str = "No points recorded yet.";

/// One row of the computed standings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// 1-based position
    pub rank: usize,
    /// Discord user ID
    pub account_id: String,
    /// Point total
    pub points: i64,
}

/// Orders a snapshot by points, highest first, and keeps the top `size` entries.
///
/// Accounts at zero are not ranked, so they never hold a badge. Equal totals keep
/// their snapshot order (the order the accounts first received points) because
/// `sort_by` is stable. There is no secondary key.
#[must_use]
pub fn compute_standings(snapshot: &Snapshot, size: usize) -> Vec<Standing> {
    let mut ordered: Vec<_> = snapshot.iter().filter(|b| b.points > 0).collect();
    ordered.sort_by(|a, b| b.points.cmp(&a.points));

    ordered
        .into_iter()
        .take(size)
        .enumerate()
        .map(|(index, balance)| Standing {
            rank: index + 1,
            account_id: balance.account_id.clone(),
            points: balance.points,
        })
        .collect()
}

/// A single rendered leaderboard line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// Rank label, e.g. `#1`
    pub label: String,
    /// Mention and total, e.g. `<@42>: 10 points`
    pub value: String,
}

/// Platform-neutral rendering of the standings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardView {
    /// Post title
    pub title: String,
    /// Ranked lines; empty when nobody has points
    pub entries: Vec<LeaderboardEntry>,
}

impl LeaderboardView {
    /// Renders standings deterministically, one entry per rank.
    #[must_use]
    pub fn render(standings: &[Standing]) -> Self {
        let entries = standings
            .iter()
            .map(|standing| LeaderboardEntry {
                label: format!("#{}", standing.rank),
                value: format!(
                    "<@{}>: {} {}",
                    standing.account_id,
                    standing.points,
                    if standing.points == 1 { "point" } else { "points" }
                ),
            })
            .collect();

        Self {
            title: LEADERBOARD_TITLE.to_string(),
            entries,
        }
    }

    /// True when the view shows the placeholder instead of entries.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain-text form, used for ephemeral replies and as embed description.
    pub fn to_text(&self) -> Result<String> {
        let mut text = String::new();
        if self.is_placeholder() {
            text.push_str(EMPTY_PLACEHOLDER);
            return Ok(text);
        }
        for entry in &self.entries {
            writeln!(&mut text, "**{}** {}", entry.label, entry.value)?;
        }
        Ok(text.trim_end().to_string())
    }
}

/// Result of editing a stored message reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The message was updated in place
    Edited,
    /// The message no longer exists
    NotFound,
}

/// The channel holding the canonical leaderboard message.
pub trait LeaderboardChannel: Sync {
    /// Posts a new leaderboard message.
    fn send(&self, view: &LeaderboardView) -> impl Future<Output = Result<MessageId>> + Send;

    /// Replaces the content of an existing message.
    fn edit(
        &self,
        message_id: MessageId,
        view: &LeaderboardView,
    ) -> impl Future<Output = Result<EditOutcome>> + Send;

    /// The most recent message the bot itself posted in the channel, if any.
    fn find_recent_own(&self) -> impl Future<Output = Result<Option<MessageId>>> + Send;
}

/// Role membership for the rank badges.
pub trait BadgeDirectory: Sync {
    /// Current holders of each badge, read in one pass over the guild.
    ///
    /// Badges whose membership cannot be read are left out of the map. Each
    /// underlying request is bounded by the implementation, not the whole scan.
    fn holders_of_all(
        &self,
        badges: &[BadgeId],
    ) -> impl Future<Output = Result<BTreeMap<BadgeId, BTreeSet<String>>>> + Send;

    /// Gives `badge` to `account_id`.
    fn grant(&self, account_id: &str, badge: BadgeId) -> impl Future<Output = Result<()>> + Send;

    /// Takes `badge` away from `account_id`.
    fn revoke(&self, account_id: &str, badge: BadgeId) -> impl Future<Output = Result<()>> + Send;
}

/// One badge change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeOp {
    /// Remove the badge for `rank` from an account that should not hold it
    Revoke {
        /// Discord user ID
        account_id: String,
        /// Badge role
        badge: BadgeId,
        /// Rank the badge stands for
        rank: usize,
    },
    /// Give the badge for `rank` to the account now at that rank
    Grant {
        /// Discord user ID
        account_id: String,
        /// Badge role
        badge: BadgeId,
        /// Rank the badge stands for
        rank: usize,
    },
}

/// Ordered badge changes for one reconciliation.
///
/// For every rank the revokes come before the grant, so a badge never has two
/// holders even for a moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgePlan {
    ops: Vec<BadgeOp>,
}

impl BadgePlan {
    /// The operations in execution order.
    #[must_use]
    pub fn ops(&self) -> &[BadgeOp] {
        &self.ops
    }

    /// True when the badges already match the standings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Computes the badge changes that make role membership match `standings`.
///
/// `badges[k]` is the badge for rank `k + 1`. Badges missing from `holders`
/// (their membership could not be read) are left alone.
#[must_use]
pub fn plan_badges(
    standings: &[Standing],
    badges: &[BadgeId],
    holders: &BTreeMap<BadgeId, BTreeSet<String>>,
) -> BadgePlan {
    let mut ops = Vec::new();

    for (index, &badge) in badges.iter().enumerate() {
        let rank = index + 1;
        let Some(current) = holders.get(&badge) else {
            continue;
        };
        let desired = standings.get(index).map(|s| s.account_id.as_str());

        ops.extend(
            current
                .iter()
                .filter(|holder| Some(holder.as_str()) != desired)
                .map(|holder| BadgeOp::Revoke {
                    account_id: holder.clone(),
                    badge,
                    rank,
                }),
        );

        if let Some(account_id) = desired {
            if !current.contains(account_id) {
                ops.push(BadgeOp::Grant {
                    account_id: account_id.to_string(),
                    badge,
                    rank,
                });
            }
        }
    }

    BadgePlan { ops }
}

/// What happened to the canonical leaderboard message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// The stored message was edited in place
    Edited(MessageId),
    /// An earlier bot post was found and became the canonical message
    Adopted(MessageId),
    /// A new message was posted and stored as canonical
    Created(MessageId),
    /// Discord could not be reached; the stored reference is unchanged
    Failed,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// The standings that were published
    pub standings: Vec<Standing>,
    /// Fate of the canonical message
    pub message: MessageOutcome,
    /// Badge changes that succeeded
    pub badges_applied: usize,
    /// Badge changes that failed and were skipped
    pub badges_failed: usize,
    /// Badges left untouched because their holders could not be listed
    pub badges_skipped: usize,
}

/// Shape of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardSettings {
    /// Entries shown
    pub size: usize,
    /// Badge roles, index 0 is rank 1
    pub badges: Vec<BadgeId>,
    /// Upper bound for any single Discord call
    pub request_timeout: Duration,
}

/// Runs reconciliation passes one at a time.
#[derive(Debug)]
pub struct Leaderboard {
    settings: LeaderboardSettings,
    running: Mutex<()>,
}

pub(crate) async fn timed<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::Timeout {
            seconds: limit.as_secs(),
        })?
}

impl Leaderboard {
    /// Creates a reconciler with the given settings.
    #[must_use]
    pub fn new(settings: LeaderboardSettings) -> Self {
        Self {
            settings,
            running: Mutex::new(()),
        }
    }

    /// The configured shape.
    #[must_use]
    pub const fn settings(&self) -> &LeaderboardSettings {
        &self.settings
    }

    /// Current top entries, without touching Discord.
    pub async fn standings(&self, ledger: &Ledger) -> Result<Vec<Standing>> {
        let snapshot = ledger.snapshot().await?;
        Ok(compute_standings(&snapshot, self.settings.size))
    }

    /// Publishes the standings and synchronizes the badges.
    ///
    /// Discord failures are logged and reported, never returned. Only a failure
    /// to read or write the database is an error.
    #[instrument(skip_all)]
    pub async fn reconcile<C, B>(
        &self,
        ledger: &Ledger,
        channel: &C,
        directory: &B,
    ) -> Result<ReconcileReport>
    where
        C: LeaderboardChannel,
        B: BadgeDirectory,
    {
        let _running = self.running.lock().await;

        let standings = self.standings(ledger).await?;
        let view = LeaderboardView::render(&standings);

        let message = self.publish(ledger.connection(), channel, &view).await?;

        let holders = match directory.holders_of_all(&self.settings.badges).await {
            Ok(holders) => holders,
            Err(e) => {
                warn!("Could not list badge holders, skipping badges: {}", e);
                BTreeMap::new()
            }
        };
        let badges_skipped = self
            .settings
            .badges
            .iter()
            .filter(|badge| !holders.contains_key(badge))
            .count();
        if badges_skipped > 0 {
            warn!("{} badges could not be listed and were left alone", badges_skipped);
        }

        let plan = plan_badges(&standings, &self.settings.badges, &holders);
        let (badges_applied, badges_failed) = self.apply_plan(directory, &plan).await;

        info!(
            "Leaderboard reconciled: {} entries, message {:?}, {} badge changes ({} failed)",
            standings.len(),
            message,
            badges_applied,
            badges_failed
        );

        Ok(ReconcileReport {
            standings,
            message,
            badges_applied,
            badges_failed,
            badges_skipped,
        })
    }

    /// Executes `plan` in order. Each call is isolated: a failure is logged and
    /// the next operation still runs. Returns (applied, failed).
    pub async fn apply_plan<B>(&self, directory: &B, plan: &BadgePlan) -> (usize, usize)
    where
        B: BadgeDirectory,
    {
        let mut applied = 0;
        let mut failed = 0;

        for op in plan.ops() {
            let result = match op {
                BadgeOp::Revoke {
                    account_id, badge, ..
                } => timed(self.settings.request_timeout, directory.revoke(account_id, *badge)).await,
                BadgeOp::Grant {
                    account_id, badge, ..
                } => timed(self.settings.request_timeout, directory.grant(account_id, *badge)).await,
            };

            match result {
                Ok(()) => {
                    debug!("Applied {:?}", op);
                    applied += 1;
                }
                Err(e) => {
                    warn!("Badge change {:?} failed, continuing: {}", op, e);
                    failed += 1;
                }
            }
        }

        (applied, failed)
    }

    async fn publish<D, C>(&self, db: &D, channel: &C, view: &LeaderboardView) -> Result<MessageOutcome>
    where
        D: ConnectionTrait,
        C: LeaderboardChannel,
    {
        let limit = self.settings.request_timeout;

        let stored = match system_state::get_value(db, LEADERBOARD_MESSAGE_KEY).await? {
            Some(raw) => match raw.parse::<MessageId>() {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Ignoring unreadable leaderboard message id {:?}: {}", raw, e);
                    None
                }
            },
            None => None,
        };

        let (target, adopted) = match stored {
            Some(id) => (Some(id), false),
            None => match timed(limit, channel.find_recent_own()).await {
                Ok(found) => (found, found.is_some()),
                Err(e) => {
                    warn!("Could not look for an earlier leaderboard post: {}", e);
                    (None, false)
                }
            },
        };

        if let Some(message_id) = target {
            match timed(limit, channel.edit(message_id, view)).await {
                Ok(EditOutcome::Edited) => {
                    if adopted {
                        system_state::set_value(db, LEADERBOARD_MESSAGE_KEY, &message_id.to_string())
                            .await?;
                        info!("Adopted message {} as the leaderboard", message_id);
                        return Ok(MessageOutcome::Adopted(message_id));
                    }
                    return Ok(MessageOutcome::Edited(message_id));
                }
                Ok(EditOutcome::NotFound) => {
                    info!("Leaderboard message {} is gone, posting a new one", message_id);
                }
                Err(e) => {
                    warn!("Failed to edit leaderboard message {}: {}", message_id, e);
                    return Ok(MessageOutcome::Failed);
                }
            }
        }

        match timed(limit, channel.send(view)).await {
            Ok(message_id) => {
                system_state::set_value(db, LEADERBOARD_MESSAGE_KEY, &message_id.to_string())
                    .await?;
                info!("Posted new leaderboard message {}", message_id);
                Ok(MessageOutcome::Created(message_id))
            }
            Err(e) => {
                warn!("Failed to post leaderboard message: {}", e);
                Ok(MessageOutcome::Failed)
            }
        }
    }
}
