//! Key-value bookkeeping in the `system_state` table.
//!
//! Holds values that are not balances, such as the canonical leaderboard message
//! reference, so they can never be mistaken for an account in the standings.

use crate::{
    entities::{SystemState, system_state},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};

/// Key holding the Discord message ID of the canonical leaderboard post.
pub const LEADERBOARD_MESSAGE_KEY: &str = "leaderboard_message_id";

/// Key holding the RFC 3339 timestamp of the last ranking reset.
pub const LAST_RESET_KEY: &str = "last_ranking_reset";

/// Reads the value stored under `key`, if any.
pub async fn get_value<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find_by_id(key.to_string()).one(db).await?;
    Ok(state.map(|s| s.value))
}

/// Stores `value` under `key`, inserting or updating as needed.
pub async fn set_value<C>(db: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();

    if let Some(state) = SystemState::find_by_id(key.to_string()).one(db).await? {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_state = system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
        };
        new_state.insert(db).await?;
    }

    tracing::debug!("Set system state: {} = {}", key, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_get_missing_key() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(get_value(&db, "nope").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_then_overwrite() -> Result<()> {
        let db = setup_test_db().await?;

        set_value(&db, LEADERBOARD_MESSAGE_KEY, "111").await?;
        assert_eq!(
            get_value(&db, LEADERBOARD_MESSAGE_KEY).await?.as_deref(),
            Some("111")
        );

        set_value(&db, LEADERBOARD_MESSAGE_KEY, "222").await?;
        assert_eq!(
            get_value(&db, LEADERBOARD_MESSAGE_KEY).await?.as_deref(),
            Some("222")
        );

        let rows = SystemState::find().all(&db).await?;
        assert_eq!(rows.len(), 1);
        Ok(())
    }
}
