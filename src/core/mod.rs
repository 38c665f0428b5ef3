//! Core business logic - framework-agnostic ranking operations.
//!
//! Nothing in here talks to Discord directly; the leaderboard reaches the outside
//! world through the traits in [`leaderboard`].

/// Leaderboard standings, rendering and badge reconciliation
pub mod leaderboard;
/// The points ledger
pub mod ledger;
/// Proof submissions and staff decisions
pub mod proof;
/// Weekly reset schedule and catch-up
pub mod reset;
/// Key-value bookkeeping
pub mod system_state;
