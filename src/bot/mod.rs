//! Bot layer - Discord-specific interface and command handlers
//!
//! This module wires the framework-agnostic core to Discord: slash commands,
//! the proof review handlers, the weekly reset scheduler, and the serenity-backed
//! implementations of the leaderboard collaborator traits.

/// Discord command implementations (ranking, general)
pub mod commands;
/// Serenity-backed leaderboard channel and badge directory
pub mod discord;
/// Gateway event handlers (proof intake, review buttons)
pub mod handlers;
/// Weekly reset scheduling and startup catch-up
pub mod scheduler;

use crate::{
    config::AppConfig,
    core::{
        leaderboard::{Leaderboard, LeaderboardSettings, ReconcileReport},
        ledger::Ledger,
        reset::ResetSchedule,
    },
    errors::{Error, Result},
};
use discord::GuildGateway;
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Shared data available to all bot commands and event handlers.
pub struct BotData {
    /// Database connection for read-only lookups
    pub database: DatabaseConnection,
    /// Validated application configuration
    pub config: Arc<AppConfig>,
    /// Sole owner of point balances
    pub ledger: Arc<Ledger>,
    /// Publishes standings and keeps badges in sync
    pub leaderboard: Arc<Leaderboard>,
    /// HTTP access to the configured guild
    pub gateway: GuildGateway,
}

impl BotData {
    /// Assembles the shared state from an initialized database.
    #[must_use]
    pub fn new(database: DatabaseConnection, config: Arc<AppConfig>, gateway: GuildGateway) -> Self {
        let leaderboard = Leaderboard::new(LeaderboardSettings {
            size: config.ranking.leaderboard_size,
            badges: config.discord.top_role_ids.clone(),
            request_timeout: config.discord.request_timeout(),
        });
        Self {
            ledger: Arc::new(Ledger::new(database.clone())),
            leaderboard: Arc::new(leaderboard),
            database,
            config,
            gateway,
        }
    }

    /// Runs one reconciliation pass against the live guild.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.leaderboard
            .reconcile(&self.ledger, &self.gateway, &self.gateway)
            .await
    }

    /// Reconciles, logging instead of returning a failure. Used after a ledger
    /// change has already been committed and reported.
    pub async fn reconcile_logged(&self) {
        if let Err(e) = self.reconcile().await {
            error!("Leaderboard reconciliation failed: {}", e);
        }
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let content = if error.is_user_facing() {
                warn!("Command `{}` rejected: {}", ctx.command().name, error);
                error.to_string()
            } else {
                error!("Error in command `{}`: {:?}", ctx.command().name, error);
                "❌ Something went wrong while running this command.".to_string()
            };
            let reply = poise::CreateReply::default().content(content).ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to send error message: {}", e);
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!("Error handling {} event: {}", event.snake_case_name(), error);
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Connects to Discord and serves until the gateway shuts down.
#[instrument(skip_all)]
pub async fn run_bot(token: String, config: Arc<AppConfig>, database: DatabaseConnection) -> Result<()> {
    let guild_id = serenity::GuildId::new(config.discord.guild_id);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id)
                    .await?;
                info!("Registered commands in guild {}", guild_id);

                let gateway = GuildGateway::new(Arc::clone(&ctx.http), &config, ready.user.id);
                let data = BotData::new(database, config, gateway);

                if data.config.reset.enabled {
                    let schedule = ResetSchedule::from(&data.config.reset);
                    scheduler::catch_up_and_publish(
                        &data.ledger,
                        &data.leaderboard,
                        &data.gateway,
                        &data.gateway,
                        schedule,
                    )
                    .await?;
                    scheduler::start_reset_scheduler(
                        Arc::clone(&data.ledger),
                        Arc::clone(&data.leaderboard),
                        data.gateway.clone(),
                        schedule,
                    )
                    .await?;
                } else {
                    info!("Weekly ranking reset disabled");
                    data.reconcile_logged().await;
                }

                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}
