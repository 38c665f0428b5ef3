//! Weekly reset scheduling.
//!
//! The reset itself lives in [`crate::core::reset`]; this module decides when it
//! runs and republishes the leaderboard afterwards.

use crate::{
    bot::discord::GuildGateway,
    core::{
        leaderboard::{BadgeDirectory, Leaderboard, LeaderboardChannel},
        ledger::Ledger,
        reset::{self, CatchUp, ResetSchedule},
    },
    errors::Result,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Clears the ranking, then publishes the empty board and strips the badges.
pub async fn reset_and_publish<C, B>(
    ledger: &Ledger,
    leaderboard: &Leaderboard,
    channel: &C,
    directory: &B,
    now: DateTime<Utc>,
) -> Result<u64>
where
    C: LeaderboardChannel,
    B: BadgeDirectory,
{
    let cleared = ledger.reset(now).await?;
    leaderboard.reconcile(ledger, channel, directory).await?;
    Ok(cleared)
}

/// Startup pass: runs a reset missed while offline, then reconciles so the
/// board and badges match the ledger before any event is handled.
pub async fn catch_up_and_publish<C, B>(
    ledger: &Ledger,
    leaderboard: &Leaderboard,
    channel: &C,
    directory: &B,
    schedule: ResetSchedule,
) -> Result<CatchUp>
where
    C: LeaderboardChannel,
    B: BadgeDirectory,
{
    let outcome = reset::catch_up(ledger, schedule, Utc::now()).await?;
    if let CatchUp::Reset { cleared } = outcome {
        info!("Catch-up reset cleared {} balances", cleared);
    }
    leaderboard.reconcile(ledger, channel, directory).await?;
    Ok(outcome)
}

/// Starts the cron job that resets the ranking every week.
pub async fn start_reset_scheduler(
    ledger: Arc<Ledger>,
    leaderboard: Arc<Leaderboard>,
    gateway: GuildGateway,
    schedule: ResetSchedule,
) -> Result<()> {
    let scheduler = JobScheduler::new().await?;
    let cron = schedule.cron_expression();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let ledger = Arc::clone(&ledger);
        let leaderboard = Arc::clone(&leaderboard);
        let gateway = gateway.clone();

        Box::pin(async move {
            match reset_and_publish(&ledger, &leaderboard, &gateway, &gateway, Utc::now()).await {
                Ok(cleared) => info!("Weekly reset done, {} balances cleared", cleared),
                Err(e) => error!("Weekly ranking reset failed: {}", e),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Weekly ranking reset scheduled ({} UTC)", cron);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            leaderboard::LeaderboardSettings,
            ledger::Adjustment,
            reset::last_reset,
        },
        test_utils::{Call, FakeChannel, FakeDirectory, setup_test_ledger},
    };
    use chrono::Weekday;
    use std::time::Duration;

    fn leaderboard() -> Leaderboard {
        Leaderboard::new(LeaderboardSettings {
            size: 10,
            badges: vec![1, 2, 3],
            request_timeout: Duration::from_secs(1),
        })
    }

    #[tokio::test]
    async fn test_reset_strips_badges_and_empties_board() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let board = leaderboard();
        let channel = FakeChannel::new();
        let directory = FakeDirectory::new(&[1, 2, 3]);

        ledger.adjust("100", Adjustment::Add(5)).await?;
        ledger.adjust("200", Adjustment::Add(3)).await?;
        board.reconcile(&ledger, &channel, &directory).await?;
        assert_eq!(directory.holders(1), vec!["100"]);
        directory.clear_calls();

        let cleared = reset_and_publish(&ledger, &board, &channel, &directory, Utc::now()).await?;
        assert_eq!(cleared, 2);
        assert!(directory.holders(1).is_empty());
        assert!(directory.holders(2).is_empty());
        assert_eq!(
            directory.calls(),
            vec![Call::revoke("100", 1), Call::revoke("200", 2)]
        );
        assert_eq!(channel.message_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_startup_records_baseline_and_publishes() -> Result<()> {
        let ledger = setup_test_ledger().await?;
        let board = leaderboard();
        let channel = FakeChannel::new();
        let directory = FakeDirectory::new(&[1, 2, 3]);
        ledger.adjust("100", Adjustment::Add(5)).await?;

        let schedule = ResetSchedule {
            weekday: Weekday::Mon,
            hour: 0,
        };
        let outcome =
            catch_up_and_publish(&ledger, &board, &channel, &directory, schedule).await?;

        assert_eq!(outcome, CatchUp::Baseline);
        assert!(last_reset(ledger.connection()).await?.is_some());
        assert_eq!(channel.sends(), 1);
        assert_eq!(directory.holders(1), vec!["100"]);

        // A second startup in the same week changes nothing
        let again = catch_up_and_publish(&ledger, &board, &channel, &directory, schedule).await?;
        assert_eq!(again, CatchUp::UpToDate);
        assert_eq!(ledger.balance("100").await?, 5);
        assert_eq!(channel.sends(), 1);
        Ok(())
    }
}
