//! Shared test utilities for `RankBuddy`.
//!
//! Provides in-memory databases plus fakes for the Discord-facing traits, so the
//! ledger, the review workflow and reconciliation can be exercised end to end.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        leaderboard::{
            BadgeDirectory, BadgeId, EditOutcome, LeaderboardChannel, LeaderboardView, MessageId,
        },
        ledger::Ledger,
    },
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a ledger over a fresh in-memory database.
pub async fn setup_test_ledger() -> Result<Ledger> {
    Ok(Ledger::new(setup_test_db().await?))
}

#[derive(Default)]
struct ChannelState {
    messages: BTreeMap<MessageId, LeaderboardView>,
    next_id: MessageId,
    sends: usize,
    edits: usize,
    recent_own: Option<MessageId>,
    unreachable: bool,
}

/// In-memory stand-in for the leaderboard channel.
pub struct FakeChannel {
    state: Mutex<ChannelState>,
}

impl FakeChannel {
    /// An empty channel.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                next_id: 1000,
                ..Default::default()
            }),
        }
    }

    /// A channel that already holds a bot post with id `message_id`.
    pub fn with_existing_post(message_id: MessageId) -> Self {
        let channel = Self::new();
        {
            let mut state = channel.state.lock().unwrap();
            state.messages.insert(
                message_id,
                LeaderboardView {
                    title: "old".to_string(),
                    entries: Vec::new(),
                },
            );
            state.recent_own = Some(message_id);
        }
        channel
    }

    /// A channel where every call fails.
    pub fn unreachable() -> Self {
        let channel = Self::new();
        channel.state.lock().unwrap().unreachable = true;
        channel
    }

    /// Deletes a message, as a moderator would.
    pub fn delete(&self, message_id: MessageId) {
        let mut state = self.state.lock().unwrap();
        state.messages.remove(&message_id);
        if state.recent_own == Some(message_id) {
            state.recent_own = None;
        }
    }

    /// Current content of a message.
    pub fn message(&self, message_id: MessageId) -> Option<LeaderboardView> {
        self.state.lock().unwrap().messages.get(&message_id).cloned()
    }

    /// Number of messages posted so far.
    pub fn sends(&self) -> usize {
        self.state.lock().unwrap().sends
    }

    /// Number of successful edits so far.
    pub fn edits(&self) -> usize {
        self.state.lock().unwrap().edits
    }

    /// Number of messages currently in the channel.
    pub fn message_count(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }
}

fn offline() -> Error {
    Error::NotFound {
        what: "Discord gateway".to_string(),
    }
}

impl LeaderboardChannel for FakeChannel {
    async fn send(&self, view: &LeaderboardView) -> Result<MessageId> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(offline());
        }
        state.next_id += 1;
        let id = state.next_id;
        state.messages.insert(id, view.clone());
        state.sends += 1;
        state.recent_own = Some(id);
        Ok(id)
    }

    async fn edit(&self, message_id: MessageId, view: &LeaderboardView) -> Result<EditOutcome> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(offline());
        }
        match state.messages.get_mut(&message_id) {
            Some(existing) => {
                *existing = view.clone();
                state.edits += 1;
                Ok(EditOutcome::Edited)
            }
            None => Ok(EditOutcome::NotFound),
        }
    }

    async fn find_recent_own(&self) -> Result<Option<MessageId>> {
        let state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(offline());
        }
        Ok(state.recent_own)
    }
}

/// A grant or revoke as seen by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `grant(account, badge)`
    Grant(String, BadgeId),
    /// `revoke(account, badge)`
    Revoke(String, BadgeId),
}

impl Call {
    /// Shorthand for tests.
    pub fn grant(account_id: &str, badge: BadgeId) -> Self {
        Self::Grant(account_id.to_string(), badge)
    }

    /// Shorthand for tests.
    pub fn revoke(account_id: &str, badge: BadgeId) -> Self {
        Self::Revoke(account_id.to_string(), badge)
    }
}

/// In-memory stand-in for guild role membership.
pub struct FakeDirectory {
    holders: Mutex<BTreeMap<BadgeId, BTreeSet<String>>>,
    calls: Mutex<Vec<Call>>,
    listings: Mutex<usize>,
    failing: BTreeSet<String>,
    unlistable: bool,
}

impl FakeDirectory {
    /// A guild where `badges` exist and nobody holds them.
    pub fn new(badges: &[BadgeId]) -> Self {
        Self {
            holders: Mutex::new(badges.iter().map(|b| (*b, BTreeSet::new())).collect()),
            calls: Mutex::new(Vec::new()),
            listings: Mutex::new(0),
            failing: BTreeSet::new(),
            unlistable: false,
        }
    }

    /// Makes every member listing fail, as if the guild could not be read.
    pub fn unlistable(mut self) -> Self {
        self.unlistable = true;
        self
    }

    /// Number of member listings so far.
    pub fn listings(&self) -> usize {
        *self.listings.lock().unwrap()
    }

    /// Makes every grant or revoke for `account_id` fail, as if they left the guild.
    pub fn failing_for(mut self, account_id: &str) -> Self {
        self.failing.insert(account_id.to_string());
        self
    }

    /// Assigns a badge behind the reconciler's back.
    pub fn give(&self, badge: BadgeId, account_id: &str) {
        self.holders
            .lock()
            .unwrap()
            .entry(badge)
            .or_default()
            .insert(account_id.to_string());
    }

    /// Sorted holders of a badge.
    pub fn holders(&self, badge: BadgeId) -> Vec<String> {
        self.holders
            .lock()
            .unwrap()
            .get(&badge)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every attempted grant and revoke, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn change(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        let (account_id, badge, add) = match call {
            Call::Grant(account_id, badge) => (account_id, badge, true),
            Call::Revoke(account_id, badge) => (account_id, badge, false),
        };
        if self.failing.contains(&account_id) {
            return Err(Error::NotFound {
                what: format!("Member {account_id}"),
            });
        }
        let mut holders = self.holders.lock().unwrap();
        let set = holders.entry(badge).or_default();
        if add {
            set.insert(account_id);
        } else {
            set.remove(&account_id);
        }
        Ok(())
    }
}

impl BadgeDirectory for FakeDirectory {
    async fn holders_of_all(
        &self,
        badges: &[BadgeId],
    ) -> Result<BTreeMap<BadgeId, BTreeSet<String>>> {
        *self.listings.lock().unwrap() += 1;
        if self.unlistable {
            return Err(offline());
        }
        let holders = self.holders.lock().unwrap();
        // Badges the guild does not know are left out
        Ok(badges
            .iter()
            .filter_map(|badge| holders.get(badge).map(|set| (*badge, set.clone())))
            .collect())
    }

    async fn grant(&self, account_id: &str, badge: BadgeId) -> Result<()> {
        self.change(Call::grant(account_id, badge))
    }

    async fn revoke(&self, account_id: &str, badge: BadgeId) -> Result<()> {
        self.change(Call::revoke(account_id, badge))
    }
}
