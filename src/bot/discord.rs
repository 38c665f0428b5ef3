//! Discord-backed implementations of the leaderboard collaborator traits.
//!
//! `GuildGateway` turns the platform-neutral calls of the reconciler into
//! serenity HTTP requests against the one configured guild.

use crate::{
    config::AppConfig,
    core::leaderboard::{
        BadgeDirectory, BadgeId, EMPTY_PLACEHOLDER, EditOutcome, LEADERBOARD_TITLE,
        LeaderboardChannel, LeaderboardView, MessageId, timed,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude::{
    self as serenity, ChannelId, CreateEmbed, CreateMessage, EditMessage, GetMessages, GuildId,
    Http, RoleId, Timestamp, UserId,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Duration,
};

const MEMBERS_PER_REQUEST: u64 = 1000;
const RECENT_MESSAGES_SCANNED: u8 = 50;
const AUDIT_REASON: &str = "Weekly ranking update";
const LEADERBOARD_COLOR: u32 = 0x00F1_C40F;

/// Builds the embed shown as the leaderboard.
#[must_use]
pub fn leaderboard_embed(view: &LeaderboardView) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title(&view.title)
        .color(LEADERBOARD_COLOR)
        .timestamp(Timestamp::now());

    if view.is_placeholder() {
        embed.description(EMPTY_PLACEHOLDER)
    } else {
        embed.fields(
            view.entries
                .iter()
                .map(|entry| (entry.label.clone(), entry.value.clone(), false)),
        )
    }
}

/// Parses a stored Discord snowflake. Zero is never a valid ID.
#[must_use]
pub fn parse_snowflake(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|id| *id != 0)
}

/// Whether a channel message is an earlier leaderboard post by this bot.
///
/// Review cards and other bot messages carry a different embed title.
#[must_use]
pub fn is_leaderboard_post(author: UserId, bot_user_id: UserId, embed_title: Option<&str>) -> bool {
    author == bot_user_id && embed_title == Some(LEADERBOARD_TITLE)
}

/// True when Discord answered 404 for the resource.
fn is_not_found(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
    )
}

/// The configured guild and leaderboard channel, reached over HTTP.
#[derive(Clone)]
pub struct GuildGateway {
    http: Arc<Http>,
    guild_id: GuildId,
    channel_id: ChannelId,
    bot_user_id: UserId,
    request_timeout: Duration,
}

impl GuildGateway {
    /// Creates a gateway for the guild and ranking channel in `config`.
    #[must_use]
    pub fn new(http: Arc<Http>, config: &AppConfig, bot_user_id: UserId) -> Self {
        Self {
            http,
            guild_id: GuildId::new(config.discord.guild_id),
            channel_id: ChannelId::new(config.discord.ranking_channel_id),
            bot_user_id,
            request_timeout: config.discord.request_timeout(),
        }
    }

    fn user_id(account_id: &str) -> Result<UserId> {
        parse_snowflake(account_id)
            .map(UserId::new)
            .ok_or_else(|| Error::NotFound {
                what: format!("Account {account_id}"),
            })
    }

    fn role_id(badge: BadgeId) -> Result<RoleId> {
        if badge == 0 {
            return Err(Error::NotFound {
                what: "Role 0".to_string(),
            });
        }
        Ok(RoleId::new(badge))
    }
}

impl LeaderboardChannel for GuildGateway {
    async fn send(&self, view: &LeaderboardView) -> Result<MessageId> {
        let message = self
            .channel_id
            .send_message(&self.http, CreateMessage::new().embed(leaderboard_embed(view)))
            .await?;
        Ok(message.id.get())
    }

    async fn edit(&self, message_id: MessageId, view: &LeaderboardView) -> Result<EditOutcome> {
        if message_id == 0 {
            return Ok(EditOutcome::NotFound);
        }
        let edit = EditMessage::new().embed(leaderboard_embed(view));

        match self
            .http
            .edit_message(
                self.channel_id,
                serenity::MessageId::new(message_id),
                &edit,
                vec![],
            )
            .await
        {
            Ok(_) => Ok(EditOutcome::Edited),
            Err(e) if is_not_found(&e) => Ok(EditOutcome::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_recent_own(&self) -> Result<Option<MessageId>> {
        let messages = self
            .channel_id
            .messages(&self.http, GetMessages::new().limit(RECENT_MESSAGES_SCANNED))
            .await?;

        // Newest first
        Ok(messages
            .iter()
            .find(|m| {
                is_leaderboard_post(
                    m.author.id,
                    self.bot_user_id,
                    m.embeds.first().and_then(|e| e.title.as_deref()),
                )
            })
            .map(|m| m.id.get()))
    }
}

impl BadgeDirectory for GuildGateway {
    async fn holders_of_all(
        &self,
        badges: &[BadgeId],
    ) -> Result<BTreeMap<BadgeId, BTreeSet<String>>> {
        let roles = badges
            .iter()
            .map(|badge| Self::role_id(*badge).map(|role| (role, *badge)))
            .collect::<Result<Vec<_>>>()?;
        let mut holders: BTreeMap<BadgeId, BTreeSet<String>> =
            badges.iter().map(|badge| (*badge, BTreeSet::new())).collect();
        let mut after: Option<u64> = None;
        let mut scanned = 0;

        loop {
            let members = timed(
                self.request_timeout,
                async {
                    self.http
                        .get_guild_members(self.guild_id, Some(MEMBERS_PER_REQUEST), after)
                        .await
                        .map_err(Error::from)
                },
            )
            .await?;
            let fetched = members.len();
            scanned += fetched;

            after = members.last().map(|m| m.user.id.get());
            for member in &members {
                for (role, badge) in &roles {
                    if member.roles.contains(role) {
                        holders
                            .entry(*badge)
                            .or_default()
                            .insert(member.user.id.to_string());
                    }
                }
            }

            if fetched < MEMBERS_PER_REQUEST as usize {
                break;
            }
        }

        tracing::debug!("Scanned {} members for {} badges", scanned, badges.len());
        Ok(holders)
    }

    async fn grant(&self, account_id: &str, badge: BadgeId) -> Result<()> {
        self.http
            .add_member_role(
                self.guild_id,
                Self::user_id(account_id)?,
                Self::role_id(badge)?,
                Some(AUDIT_REASON),
            )
            .await?;
        tracing::info!("Granted role {} to {}", badge, account_id);
        Ok(())
    }

    async fn revoke(&self, account_id: &str, badge: BadgeId) -> Result<()> {
        self.http
            .remove_member_role(
                self.guild_id,
                Self::user_id(account_id)?,
                Self::role_id(badge)?,
                Some(AUDIT_REASON),
            )
            .await?;
        tracing::info!("Removed role {} from {}", badge, account_id);
        Ok(())
    }
}
