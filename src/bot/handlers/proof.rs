//! Proof submissions and staff review.
//!
//! A message with an attachment in the proof channel becomes a pending proof and
//! a review card in the staff channel. The card's buttons carry a
//! [`ReviewAction`] custom ID; the first decision wins and disables them.

use crate::{
    bot::{BotData, commands::is_administrator},
    config::DiscordConfig,
    core::proof::{self, DecisionOutcome, NewSubmission, ReviewAction},
    entities::ProofModel,
    errors::{Error, Result},
};
use poise::serenity_prelude::{
    self as serenity, ButtonStyle, ChannelId, CreateActionRow, CreateButton, CreateEmbed,
    CreateEmbedFooter, CreateInteractionResponse, CreateInteractionResponseMessage,
    CreateMessage, EditMessage, RoleId,
};
use tracing::{debug, info, instrument, warn};

const PENDING_COLOR: u32 = 0x0034_98DB;
const APPROVED_COLOR: u32 = 0x002E_CC71;
const REJECTED_COLOR: u32 = 0x00E7_4C3C;

/// Whether a message belongs to the proof workflow.
#[must_use]
pub fn is_proof_submission(
    discord: &DiscordConfig,
    guild_id: Option<u64>,
    channel_id: u64,
    author_is_bot: bool,
    attachment_count: usize,
) -> bool {
    !author_is_bot
        && guild_id == Some(discord.guild_id)
        && channel_id == discord.proof_channel_id
        && attachment_count > 0
}

/// Whether a member may approve or reject proofs: administrators always, and
/// holders of the configured reviewer role.
#[must_use]
pub fn may_review(is_admin: bool, roles: &[RoleId], reviewer_role_id: Option<u64>) -> bool {
    is_admin || reviewer_role_id.is_some_and(|id| roles.iter().any(|r| r.get() == id))
}

/// Approve and Reject buttons for a proof.
#[must_use]
pub fn review_buttons(submission_id: &str, enabled: bool) -> Vec<CreateActionRow> {
    let approve = ReviewAction::Approve(submission_id.to_string());
    let reject = ReviewAction::Reject(submission_id.to_string());

    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(approve.custom_id())
            .label("Approve")
            .style(ButtonStyle::Success)
            .disabled(!enabled),
        CreateButton::new(reject.custom_id())
            .label("Reject")
            .style(ButtonStyle::Danger)
            .disabled(!enabled),
    ])]
}

fn review_embed(stored: &ProofModel, message: &serenity::Message) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title("📸 New proof submitted")
        .description(format!(
            "<@{}> submitted a proof.\n[Jump to message]({})",
            stored.user_id,
            message.link()
        ))
        .color(PENDING_COLOR)
        .footer(CreateEmbedFooter::new(format!(
            "Submission {}",
            stored.submission_id
        )))
        .timestamp(message.timestamp);

    let image = message.attachments.iter().find(|a| {
        a.content_type
            .as_deref()
            .is_some_and(|t| t.starts_with("image/"))
    });
    if let Some(attachment) = image {
        embed = embed.image(&attachment.url);
    }
    embed
}

/// Records a qualifying message as a pending proof and posts its review card.
#[instrument(skip_all, fields(message_id = %message.id))]
pub async fn handle_submission(
    ctx: &serenity::Context,
    message: &serenity::Message,
    data: &BotData,
) -> Result<()> {
    let discord = &data.config.discord;
    if !is_proof_submission(
        discord,
        message.guild_id.map(serenity::GuildId::get),
        message.channel_id.get(),
        message.author.bot,
        message.attachments.len(),
    ) {
        return Ok(());
    }

    let submission = NewSubmission {
        submission_id: message.id.to_string(),
        user_id: message.author.id.to_string(),
        channel_id: message.channel_id.to_string(),
        attachment_url: message.attachments.first().map(|a| a.url.clone()),
    };
    let (stored, created) = proof::record_submission(&data.database, submission).await?;
    if !proof::awaiting_review_card(&stored) {
        debug!("Proof {} needs no review card", stored.submission_id);
        return Ok(());
    }
    if !created {
        info!("Re-posting missing review card for {}", stored.submission_id);
    }

    let card = CreateMessage::new()
        .embed(review_embed(&stored, message))
        .components(review_buttons(&stored.submission_id, true));
    let posted = ChannelId::new(discord.staff_channel_id)
        .send_message(ctx, card)
        .await?;
    proof::set_review_message(&data.database, &stored.submission_id, &posted.id.to_string())
        .await?;

    info!(
        "Proof {} from {} sent for review",
        stored.submission_id, stored.user_id
    );
    Ok(())
}

/// The review card after a decision: same content, result stamped, buttons off.
fn decided_card(
    component: &serenity::ComponentInteraction,
    action: &ReviewAction,
    outcome: &DecisionOutcome,
    reviewer: serenity::UserId,
) -> EditMessage {
    let edit = EditMessage::new().components(review_buttons(action.submission_id(), false));

    let stamp = match outcome {
        DecisionOutcome::Approved { new_total, .. } => Some((
            APPROVED_COLOR,
            format!("✅ Approved by <@{reviewer}> (now {new_total} points)"),
        )),
        DecisionOutcome::Rejected { .. } => {
            Some((REJECTED_COLOR, format!("❌ Rejected by <@{reviewer}>")))
        }
        DecisionOutcome::AlreadyProcessed { .. } | DecisionOutcome::Unknown => None,
    };

    match (stamp, component.message.embeds.first()) {
        (Some((color, text)), Some(original)) => edit.embed(
            CreateEmbed::from(original.clone())
                .color(color)
                .field("Decision", text, false),
        ),
        _ => edit,
    }
}

/// Handles a click on an Approve or Reject button.
#[instrument(skip_all, fields(custom_id = %component.data.custom_id))]
pub async fn handle_review(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &BotData,
) -> Result<()> {
    let Some(action) = ReviewAction::parse(&component.data.custom_id) else {
        return Ok(());
    };

    let (is_admin, roles) = component.member.as_ref().map_or((false, &[][..]), |m| {
        (
            is_administrator(m.permissions),
            m.roles.as_slice(),
        )
    });
    if !may_review(is_admin, roles, data.config.discord.reviewer_role_id) {
        warn!("{} tried to review without permission", component.user.id);
        return respond_ephemeral(ctx, component, &Error::PermissionDenied.to_string()).await;
    }

    let outcome = proof::decide(
        &data.ledger,
        &action,
        &component.user.id.to_string(),
        data.config.ranking.approval_award,
    )
    .await?;

    respond_ephemeral(ctx, component, &outcome.reply_text()).await?;

    let card = decided_card(component, &action, &outcome, component.user.id);
    if let Err(e) = ctx
        .http
        .edit_message(component.channel_id, component.message.id, &card, vec![])
        .await
    {
        warn!("Could not update review card for {}: {}", action.submission_id(), e);
    }

    if outcome.changes_ranking() {
        data.reconcile_logged().await;
    }
    Ok(())
}

async fn respond_ephemeral(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    content: &str,
) -> Result<()> {
    component
        .create_response(
            ctx,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
