//! Ranking commands - point adjustments, manual reset, and standings lookups.
//!
//! Every mutation is gated on the administrator permission and goes through the
//! ledger. The command defers and answers before the leaderboard is republished,
//! since a reconciliation pass can outlast Discord's reply window.

use crate::core::ledger::Adjustment;
use poise::serenity_prelude::Permissions;

/// Whether the invoking member's resolved permissions include administrator.
///
/// Interaction payloads carry the permissions; without them nobody is admin.
#[must_use]
pub fn is_administrator(permissions: Option<Permissions>) -> bool {
    permissions.is_some_and(|p| p.administrator())
}

const fn points_label(points: i64) -> &'static str {
    if points == 1 { "point" } else { "points" }
}

/// Confirmation shown to the administrator after an adjustment.
#[must_use]
pub fn adjustment_reply(adjustment: Adjustment, user_id: u64, total: i64) -> String {
    let verb = match adjustment {
        Adjustment::Add(_) => "Added",
        Adjustment::Remove(_) => "Removed",
    };
    format!(
        "✅ {verb} {} {} for <@{user_id}>. New total: {total} {}.",
        adjustment.amount(),
        points_label(adjustment.amount()),
        points_label(total)
    )
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{adjustment_reply, is_administrator, points_label};
    use crate::{
        bot::BotData,
        core::{leaderboard::LeaderboardView, ledger::Adjustment},
        errors::{Error, Result},
    };
    use chrono::Utc;
    use poise::{CreateReply, serenity_prelude as serenity};
    use tracing::info;

    type Context<'a> = poise::Context<'a, BotData, Error>;

    /// Fails with `PermissionDenied` unless the invoker is a guild administrator.
    async fn ensure_admin(ctx: Context<'_>) -> Result<()> {
        let permissions = ctx.author_member().await.and_then(|member| member.permissions);
        if is_administrator(permissions) {
            Ok(())
        } else {
            Err(Error::PermissionDenied)
        }
    }

    async fn reply_ephemeral(ctx: Context<'_>, content: String) -> Result<()> {
        ctx.send(CreateReply::default().content(content).ephemeral(true))
            .await?;
        Ok(())
    }

    async fn apply(ctx: Context<'_>, user: &serenity::User, adjustment: Adjustment) -> Result<()> {
        ensure_admin(ctx).await?;
        ctx.defer_ephemeral().await?;
        let data = ctx.data();

        let total = data.ledger.adjust(&user.id.to_string(), adjustment).await?;
        info!(
            "{} applied {:?} to {}, total now {}",
            ctx.author().id,
            adjustment,
            user.id,
            total
        );

        reply_ephemeral(ctx, adjustment_reply(adjustment, user.id.get(), total)).await?;
        data.reconcile_logged().await;
        Ok(())
    }

    /// Adds points to a member.
    #[poise::command(slash_command, guild_only)]
    pub async fn add_points(
        ctx: Context<'_>,
        #[description = "Member receiving the points"] user: serenity::User,
        #[description = "Points to add"]
        #[min = 1]
        amount: i64,
    ) -> Result<()> {
        apply(ctx, &user, Adjustment::Add(amount)).await
    }

    /// Removes points from a member. Totals never drop below zero.
    #[poise::command(slash_command, guild_only)]
    pub async fn remove_points(
        ctx: Context<'_>,
        #[description = "Member losing the points"] user: serenity::User,
        #[description = "Points to remove"]
        #[min = 1]
        amount: i64,
    ) -> Result<()> {
        apply(ctx, &user, Adjustment::Remove(amount)).await
    }

    /// Clears the weekly ranking immediately.
    #[poise::command(slash_command, guild_only)]
    pub async fn reset_ranking(ctx: Context<'_>) -> Result<()> {
        ensure_admin(ctx).await?;
        ctx.defer_ephemeral().await?;
        let data = ctx.data();

        let cleared = data.ledger.reset(Utc::now()).await?;
        info!("{} reset the ranking manually", ctx.author().id);

        reply_ephemeral(
            ctx,
            format!("🔄 Ranking reset. {cleared} balances cleared."),
        )
        .await?;
        data.reconcile_logged().await;
        Ok(())
    }

    /// Shows the current top of the weekly ranking.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn ranking(ctx: Context<'_>) -> Result<()> {
        let data = ctx.data();
        let standings = data.leaderboard.standings(&data.ledger).await?;
        let text = LeaderboardView::render(&standings).to_text()?;
        reply_ephemeral(ctx, text).await
    }

    /// Shows a member's points.
    #[poise::command(slash_command, prefix_command, guild_only)]
    pub async fn points(
        ctx: Context<'_>,
        #[description = "Member to look up (defaults to you)"] user: Option<serenity::User>,
    ) -> Result<()> {
        let target = user.as_ref().unwrap_or_else(|| ctx.author());
        let total = ctx.data().ledger.balance(&target.id.to_string()).await?;
        reply_ephemeral(
            ctx,
            format!("<@{}> has {total} {}.", target.id, points_label(total)),
        )
        .await
    }
}

// Re-export all commands
pub use inner::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_administrator_allowed() {
        assert!(is_administrator(Some(Permissions::ADMINISTRATOR)));
        assert!(is_administrator(Some(
            Permissions::ADMINISTRATOR | Permissions::SEND_MESSAGES
        )));
    }

    #[test]
    fn test_non_administrator_denied() {
        assert!(!is_administrator(Some(Permissions::empty())));
        assert!(!is_administrator(Some(
            Permissions::MANAGE_ROLES | Permissions::MANAGE_MESSAGES
        )));
        // Member data without resolved permissions
        assert!(!is_administrator(None));
    }

    #[test]
    fn test_adjustment_reply() {
        assert_eq!(
            adjustment_reply(Adjustment::Add(3), 42, 7),
            "✅ Added 3 points for <@42>. New total: 7 points."
        );
        assert_eq!(
            adjustment_reply(Adjustment::Remove(1), 42, 1),
            "✅ Removed 1 point for <@42>. New total: 1 point."
        );
    }
}
