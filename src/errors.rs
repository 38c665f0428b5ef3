use thiserror::Error;

/// Every failure the bot can surface, from validation to persistence.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Invalid amount: {amount} (must be greater than zero)")]
    InvalidAmount { amount: i64 },

    #[error("You do not have permission to use this command.")]
    PermissionDenied,

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Discord call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    Discord(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Discord(Box::new(value))
    }
}

impl Error {
    /// Whether the message is meant for the person who triggered the command,
    /// as opposed to an internal failure that only belongs in the logs.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(self, Self::InvalidAmount { .. } | Self::PermissionDenied)
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_errors() {
        assert!(Error::InvalidAmount { amount: 0 }.is_user_facing());
        assert!(Error::PermissionDenied.is_user_facing());
        assert!(
            !Error::Config {
                message: "bad".to_string()
            }
            .is_user_facing()
        );
        assert!(
            !Error::Database(sea_orm::DbErr::Custom("disk full".to_string())).is_user_facing()
        );
    }

    #[test]
    fn test_invalid_amount_message() {
        let err = Error::InvalidAmount { amount: -4 };
        assert_eq!(
            err.to_string(),
            "Invalid amount: -4 (must be greater than zero)"
        );
    }
}
