//! Weekly ranking reset.
//!
//! Resets are calendar-aligned: they happen at a fixed weekday and hour (UTC),
//! not a fixed interval after the bot started. The time of the last reset is
//! kept in the `system_state` table so a reset missed while the bot was down
//! runs as soon as it starts again.

use crate::{
    config::ResetConfig,
    core::{
        ledger::Ledger,
        system_state::{self, LAST_RESET_KEY},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use sea_orm::ConnectionTrait;
use tracing::info;

/// When the weekly reset fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSchedule {
    /// Day of the week
    pub weekday: Weekday,
    /// Hour of the day, UTC
    pub hour: u32,
}

impl From<&ResetConfig> for ResetSchedule {
    fn from(config: &ResetConfig) -> Self {
        Self {
            weekday: config.weekday,
            hour: config.hour,
        }
    }
}

impl ResetSchedule {
    /// Six-field cron expression (seconds first) for the scheduler.
    #[must_use]
    pub fn cron_expression(&self) -> String {
        format!(
            "0 0 {} * * {}",
            self.hour,
            self.weekday.to_string().to_uppercase()
        )
    }

    /// Start of the weekly period containing `now`: the latest scheduled reset
    /// time that is not after `now`.
    pub fn period_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let time = NaiveTime::from_hms_opt(self.hour, 0, 0).ok_or_else(|| Error::Config {
            message: format!("Invalid reset hour {}", self.hour),
        })?;

        let today = now.date_naive();
        let days_back = (7 + today.weekday().num_days_from_monday()
            - self.weekday.num_days_from_monday())
            % 7;
        let candidate = (today - Duration::days(i64::from(days_back)))
            .and_time(time)
            .and_utc();

        if candidate > now {
            Ok(candidate - Duration::weeks(1))
        } else {
            Ok(candidate)
        }
    }
}

/// When the ranking was last reset, if ever.
pub async fn last_reset<C>(db: &C) -> Result<Option<DateTime<Utc>>>
where
    C: ConnectionTrait,
{
    let Some(raw) = system_state::get_value(db, LAST_RESET_KEY).await? else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| Error::Config {
            message: format!("Failed to parse last reset time {raw:?}: {e}"),
        })
}

/// What the startup check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUp {
    /// No reset was ever recorded; `now` became the baseline and nothing was cleared
    Baseline,
    /// The last reset belongs to the current period
    UpToDate,
    /// A scheduled reset was missed and has now run
    Reset {
        /// Balances cleared
        cleared: u64,
    },
}

/// Runs a reset missed while the bot was offline.
pub async fn catch_up(ledger: &Ledger, schedule: ResetSchedule, now: DateTime<Utc>) -> Result<CatchUp> {
    let Some(last) = last_reset(ledger.connection()).await? else {
        system_state::set_value(ledger.connection(), LAST_RESET_KEY, &now.to_rfc3339()).await?;
        info!("No previous ranking reset recorded, using {} as baseline", now);
        return Ok(CatchUp::Baseline);
    };

    if last >= schedule.period_start(now)? {
        return Ok(CatchUp::UpToDate);
    }

    info!("Missed ranking reset (last at {}), resetting now", last);
    let cleared = ledger.reset(now).await?;
    Ok(CatchUp::Reset { cleared })
}
