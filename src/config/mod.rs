//! Configuration loading for `RankBuddy`.
//!
//! Settings live in a TOML file (path from `CONFIG_PATH`, default `config.toml`).
//! Secrets such as the bot token stay in the environment and are read where used.

/// Database configuration and connection management
pub mod database;

use crate::errors::{Error, Result};
use chrono::Weekday;
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    /// Guild, channel and role identifiers
    pub discord: DiscordConfig,
    /// Scoring and leaderboard shape
    #[serde(default)]
    pub ranking: RankingConfig,
    /// Weekly reset schedule
    #[serde(default)]
    pub reset: ResetConfig,
}

/// Discord identifiers the bot operates on.
#[derive(Deserialize, Debug, Clone)]
pub struct DiscordConfig {
    /// The single guild the bot serves
    pub guild_id: u64,
    /// Channel where members post proof attachments
    pub proof_channel_id: u64,
    /// Channel where staff approve or reject proofs
    pub staff_channel_id: u64,
    /// Channel holding the canonical leaderboard message
    pub ranking_channel_id: u64,
    /// Role IDs for the rank badges; index 0 is "Top 1"
    pub top_role_ids: Vec<u64>,
    /// Extra role allowed to review proofs besides administrators
    #[serde(default)]
    pub reviewer_role_id: Option<u64>,
    /// Seconds to wait on a single Discord call before giving up on it
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl DiscordConfig {
    /// Timeout applied to best-effort Discord calls.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Scoring settings.
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct RankingConfig {
    /// Points granted when a proof is approved
    #[serde(default = "default_approval_award")]
    pub approval_award: i64,
    /// Number of entries shown on the leaderboard
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            approval_award: default_approval_award(),
            leaderboard_size: default_leaderboard_size(),
        }
    }
}

/// When the weekly reset fires. Times are UTC.
#[derive(Deserialize, Debug, Clone, Copy)]
pub struct ResetConfig {
    /// Whether the scheduled reset runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Day of the week, e.g. `"Mon"`
    #[serde(default = "default_reset_weekday")]
    pub weekday: Weekday,
    /// Hour of the day, 0-23
    #[serde(default)]
    pub hour: u32,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weekday: default_reset_weekday(),
            hour: 0,
        }
    }
}

const fn default_approval_award() -> i64 {
    3
}

const fn default_leaderboard_size() -> usize {
    10
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}

const fn default_reset_weekday() -> Weekday {
    Weekday::Mon
}

impl AppConfig {
    /// Checks the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.discord.top_role_ids.is_empty() {
            return Err(Error::Config {
                message: "discord.top_role_ids must list at least one role".to_string(),
            });
        }
        let ids = [
            ("discord.guild_id", self.discord.guild_id),
            ("discord.proof_channel_id", self.discord.proof_channel_id),
            ("discord.staff_channel_id", self.discord.staff_channel_id),
            ("discord.ranking_channel_id", self.discord.ranking_channel_id),
        ];
        if let Some((name, _)) = ids.iter().find(|(_, id)| *id == 0) {
            return Err(Error::Config {
                message: format!("{name} must be a non-zero Discord ID"),
            });
        }
        if self.discord.ranking_channel_id == self.discord.staff_channel_id {
            return Err(Error::Config {
                message: "discord.ranking_channel_id must differ from discord.staff_channel_id"
                    .to_string(),
            });
        }
        if self.discord.top_role_ids.contains(&0) || self.discord.reviewer_role_id == Some(0) {
            return Err(Error::Config {
                message: "role IDs must be non-zero".to_string(),
            });
        }
        let distinct: std::collections::BTreeSet<u64> =
            self.discord.top_role_ids.iter().copied().collect();
        if distinct.len() != self.discord.top_role_ids.len() {
            return Err(Error::Config {
                message: "discord.top_role_ids must not repeat a role".to_string(),
            });
        }
        if self.ranking.approval_award <= 0 {
            return Err(Error::Config {
                message: format!(
                    "ranking.approval_award must be positive, got {}",
                    self.ranking.approval_award
                ),
            });
        }
        if self.ranking.leaderboard_size < self.discord.top_role_ids.len() {
            return Err(Error::Config {
                message: format!(
                    "ranking.leaderboard_size ({}) is smaller than the number of top roles ({})",
                    self.ranking.leaderboard_size,
                    self.discord.top_role_ids.len()
                ),
            });
        }
        if self.reset.hour > 23 {
            return Err(Error::Config {
                message: format!("reset.hour must be 0-23, got {}", self.reset.hour),
            });
        }
        if self.discord.request_timeout_secs == 0 {
            return Err(Error::Config {
                message: "discord.request_timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses and validates a configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let app_config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse TOML configuration: {e}"),
    })?;
    app_config.validate()?;
    Ok(app_config)
}

/// Reads the configuration file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Loads the configuration from `CONFIG_PATH`, falling back to `config.toml`.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let app_config = load_config(&path)
        .inspect_err(|e| tracing::error!("Critical error loading configuration: {}", e))?;
    tracing::info!(
        "Loaded configuration from {} ({} rank badges, top {} shown)",
        path,
        app_config.discord.top_role_ids.len(),
        app_config.ranking.leaderboard_size
    );
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const MINIMAL: &str = r"
        [discord]
        guild_id = 1
        proof_channel_id = 2
        staff_channel_id = 3
        ranking_channel_id = 4
        top_role_ids = [10, 11, 12]
    ";

    #[test]
    fn test_defaults_applied() -> Result<()> {
        let config = parse_config(MINIMAL)?;
        assert_eq!(config.ranking.approval_award, 3);
        assert_eq!(config.ranking.leaderboard_size, 10);
        assert!(config.reset.enabled);
        assert_eq!(config.reset.weekday, Weekday::Mon);
        assert_eq!(config.reset.hour, 0);
        assert_eq!(config.discord.reviewer_role_id, None);
        assert_eq!(config.discord.request_timeout(), Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<()> {
        let text = format!(
            "{MINIMAL}
            [ranking]
            approval_award = 5
            leaderboard_size = 15

            [reset]
            weekday = \"Sun\"
            hour = 18
            "
        );
        let config = parse_config(&text)?;
        assert_eq!(config.ranking.approval_award, 5);
        assert_eq!(config.ranking.leaderboard_size, 15);
        assert_eq!(config.reset.weekday, Weekday::Sun);
        assert_eq!(config.reset.hour, 18);
        Ok(())
    }

    #[test]
    fn test_rejects_empty_roles() {
        let text = MINIMAL.replace("[10, 11, 12]", "[]");
        let result = parse_config(&text);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_rejects_board_smaller_than_badges() {
        let text = format!("{MINIMAL}\n[ranking]\nleaderboard_size = 2\n");
        assert!(matches!(parse_config(&text), Err(Error::Config { .. })));
    }

    #[test]
    fn test_rejects_bad_hour() {
        let text = format!("{MINIMAL}\n[reset]\nhour = 24\n");
        assert!(matches!(parse_config(&text), Err(Error::Config { .. })));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            parse_config("[discord"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_and_repeated_ids() {
        let zero_guild = MINIMAL.replace("guild_id = 1", "guild_id = 0");
        assert!(matches!(parse_config(&zero_guild), Err(Error::Config { .. })));

        let zero_role = MINIMAL.replace("[10, 11, 12]", "[10, 0, 12]");
        assert!(matches!(parse_config(&zero_role), Err(Error::Config { .. })));

        let repeated = MINIMAL.replace("[10, 11, 12]", "[10, 11, 10]");
        assert!(matches!(parse_config(&repeated), Err(Error::Config { .. })));
    }

    #[test]
    fn test_rejects_shared_ranking_and_staff_channel() {
        let text = MINIMAL.replace("ranking_channel_id = 4", "ranking_channel_id = 3");
        assert!(matches!(parse_config(&text), Err(Error::Config { .. })));
    }
}
