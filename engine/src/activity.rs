use chrono::{DateTime, NaiveDate, Utc};

use highrise_types::api::{AllTimeStats, DailyActivityRow, DailySummary};

use crate::{Engine, EngineError};

impl Engine {
    /// Upsert today's activity row: insert with first/last-seen on first
    /// contact of the (UTC) day, touch last-seen afterwards.
    pub async fn touch_activity(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO daily_activity (user_id, date, first_seen_at, last_seen_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id, date) DO UPDATE SET last_seen_at = excluded.last_seen_at",
        )
        .bind(user_id)
        .bind(now.date_naive())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Bump the day's games counter. Called once per saved game.
    pub async fn increment_daily_games(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE daily_activity SET games_played = games_played + 1 \
             WHERE user_id = ? AND date = ?",
        )
        .bind(user_id)
        .bind(date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Per-user detail rows for one day, ordered by first contact.
    pub async fn daily_stats(&self, date: NaiveDate) -> Result<Vec<DailyActivityRow>, EngineError> {
        let rows = sqlx::query_as::<_, DailyActivityRow>(
            "SELECT da.user_id, u.telegram_id, u.username, u.first_name, \
                    da.first_seen_at, da.last_seen_at, da.games_played \
             FROM daily_activity da \
             INNER JOIN users u ON da.user_id = u.id \
             WHERE da.date = ? \
             ORDER BY da.first_seen_at ASC",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Rollup for one day.
    pub async fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, EngineError> {
        let summary = sqlx::query_as::<_, DailySummary>(
            "SELECT \
                COUNT(DISTINCT user_id) AS total_users, \
                COALESCE(SUM(games_played), 0) AS total_games, \
                COUNT(DISTINCT CASE WHEN games_played > 0 THEN user_id END) AS active_users \
             FROM daily_activity \
             WHERE date = ?",
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    /// All-time rollup for the admin dashboard.
    pub async fn all_time_stats(&self, now: DateTime<Utc>) -> Result<AllTimeStats, EngineError> {
        let week_ago = now - chrono::Duration::days(7);
        let month_ago = now - chrono::Duration::days(30);
        let stats = sqlx::query_as::<_, AllTimeStats>(
            "SELECT \
                COUNT(id) AS total_users, \
                COALESCE(SUM(total_games), 0) AS total_games, \
                COALESCE(SUM(total_bonuses), 0) AS total_bonuses, \
                COALESCE(MAX(best_score), 0) AS best_score, \
                COUNT(CASE WHEN total_games > 0 THEN id END) AS active_users, \
                COUNT(CASE WHEN created_at >= ? THEN id END) AS new_users_7d, \
                COUNT(CASE WHEN created_at >= ? THEN id END) AS new_users_30d \
             FROM users",
        )
        .bind(week_ago)
        .bind(month_ago)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
