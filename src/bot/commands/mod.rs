//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// General utility commands
pub mod general;

/// Ranking and points commands
pub mod ranking;

use crate::{bot::BotData, errors::Error};

// Export commands
pub use general::*;
pub use ranking::*;

/// Every command the bot registers.
#[must_use]
pub fn all() -> Vec<poise::Command<BotData, Error>> {
    vec![
        add_points(),
        remove_points(),
        reset_ranking(),
        ranking(),
        points(),
        ping(),
        help(),
    ]
}
