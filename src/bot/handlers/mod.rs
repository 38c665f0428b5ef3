//! Discord gateway event handlers
//!
//! Everything that is not a slash command arrives here: proof submissions in the
//! proof channel and clicks on the review buttons in the staff channel.

/// Proof intake and review button handling
pub mod proof;

use crate::{bot::BotData, errors::{Error, Result}};
use poise::serenity_prelude as serenity;

/// Routes gateway events to their handlers.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            proof::handle_submission(ctx, new_message, data).await?;
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            proof::handle_review(ctx, component, data).await?;
        }
        _ => {}
    }
    Ok(())
}
