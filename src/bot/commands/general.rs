//! General Discord commands - ping, help, and other utility commands.
//! This module contains simple commands that don't require database operations
//! and provide basic bot functionality and user assistance.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let award = ctx.data().config.ranking.approval_award;
        let help_text = format!(
            "**RankBuddy Help**\n\
            Post a screenshot in the proof channel. Once staff approve it you earn \
            **{award} points**. The top members of the week get a rank role, and the \
            ranking resets every week.\n\n\
            **Everyone**\n\
            • `/ranking` - Shows the current top of the weekly ranking.\n\
            • `/points [user]` - Shows your points, or another member's.\n\
            • `/ping` - Checks if the bot is responsive.\n\
            • `/help` - Shows this help message.\n\n\
            **Administrators**\n\
            • `/add_points <user> <amount>` - Adds points to a member.\n\
            • `/remove_points <user> <amount>` - Removes points, never below zero.\n\
            • `/reset_ranking` - Clears the weekly ranking now."
        );

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
