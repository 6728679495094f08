use chrono::{DateTime, Utc};

use highrise_types::api::BroadcastTarget;
use highrise_types::Advertisement;

use crate::{Engine, EngineError};

const AD_COLUMNS: &str =
    "id, title, message, created_at, sent_at, sent_count, \
     target_all_users, min_games, min_bonuses, is_active";

/// Targeting options for a new advertisement.
#[derive(Clone, Copy, Debug)]
pub struct AdTargeting {
    pub target_all_users: bool,
    pub min_games: i64,
    pub min_bonuses: i64,
}

impl Default for AdTargeting {
    fn default() -> Self {
        Self {
            target_all_users: true,
            min_games: 0,
            min_bonuses: 0,
        }
    }
}

impl Engine {
    pub async fn create_advertisement(
        &self,
        title: &str,
        message: &str,
        targeting: AdTargeting,
        now: DateTime<Utc>,
    ) -> Result<i64, EngineError> {
        let result = sqlx::query(
            "INSERT INTO advertisements \
             (title, message, created_at, target_all_users, min_games, min_bonuses, is_active) \
             VALUES (?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(title)
        .bind(message)
        .bind(now)
        .bind(targeting.target_all_users)
        .bind(targeting.min_games)
        .bind(targeting.min_bonuses)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn advertisement(&self, ad_id: i64) -> Result<Option<Advertisement>, EngineError> {
        let sql = format!("SELECT {AD_COLUMNS} FROM advertisements WHERE id = ?");
        let ad = sqlx::query_as::<_, Advertisement>(&sql)
            .bind(ad_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ad)
    }

    pub async fn advertisements(
        &self,
        active_only: bool,
    ) -> Result<Vec<Advertisement>, EngineError> {
        let sql = if active_only {
            format!("SELECT {AD_COLUMNS} FROM advertisements WHERE is_active = 1 ORDER BY created_at DESC")
        } else {
            format!("SELECT {AD_COLUMNS} FROM advertisements ORDER BY created_at DESC")
        };
        let ads = sqlx::query_as::<_, Advertisement>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(ads)
    }

    /// Recipients matching the advertisement's targeting filters.
    pub async fn broadcast_targets(
        &self,
        ad: &Advertisement,
    ) -> Result<Vec<BroadcastTarget>, EngineError> {
        let targets = if ad.target_all_users {
            sqlx::query_as::<_, BroadcastTarget>(
                "SELECT id, telegram_id, username, first_name FROM users",
            )
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, BroadcastTarget>(
                "SELECT id, telegram_id, username, first_name FROM users \
                 WHERE total_games >= ? AND total_bonuses >= ?",
            )
            .bind(ad.min_games)
            .bind(ad.min_bonuses)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(targets)
    }

    /// Record one delivery attempt, success or failure.
    pub async fn log_advertisement_send(
        &self,
        ad_id: i64,
        user_id: i64,
        status: &str,
        error_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO advertisement_logs \
             (advertisement_id, user_id, sent_at, status, error_message) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(ad_id)
        .bind(user_id)
        .bind(now)
        .bind(status)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_advertisement_sent(
        &self,
        ad_id: i64,
        sent_count: i64,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        sqlx::query("UPDATE advertisements SET sent_count = ?, sent_at = ? WHERE id = ?")
            .bind(sent_count)
            .bind(now)
            .bind(ad_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
