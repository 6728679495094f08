use chrono::{DateTime, Utc};

use highrise_types::api::{Eligibility, ElapsedCooldown};
use highrise_types::{cooldown, CooldownAttempt};

use crate::{Engine, EngineError};

impl Engine {
    /// Pure read: whether the user may start a bonus-mode game at `now`.
    /// No attempt row means "never attempted, eligible".
    pub async fn check_bonus_eligibility(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Eligibility, EngineError> {
        let attempt = sqlx::query_as::<_, CooldownAttempt>(
            "SELECT user_id, last_attempt FROM bonus_attempts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(attempt) = attempt else {
            return Ok(Eligibility::open());
        };

        let next_available_at = attempt.last_attempt + cooldown();
        if now >= next_available_at {
            Ok(Eligibility::open())
        } else {
            Ok(Eligibility::blocked_until(next_available_at))
        }
    }

    /// Gate and consume the daily slot in one step. Called when a
    /// bonus-mode session *starts*: an abandoned session still burns the
    /// attempt, so the timer cannot be reset by bailing out.
    pub async fn start_bonus_attempt(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let eligibility = self.check_bonus_eligibility(user_id, now).await?;
        if !eligibility.can_play {
            let next_available_at = eligibility
                .next_available_at
                .unwrap_or_else(|| now + cooldown());
            return Err(EngineError::AlreadyOnCooldown { next_available_at });
        }

        self.record_bonus_attempt(user_id, now).await
    }

    /// Overwrite the single attempt row for the user.
    pub async fn record_bonus_attempt(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO bonus_attempts (user_id, last_attempt) VALUES (?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET last_attempt = excluded.last_attempt",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Users whose cooldown elapses inside `[window_start, window_end]`,
    /// for the hourly notification sweep. Read-only: never touches the
    /// attempt rows.
    pub async fn cooldowns_elapsed_between(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<ElapsedCooldown>, EngineError> {
        let rows = sqlx::query_as::<_, (i64, DateTime<Utc>, i64, Option<String>, Option<String>)>(
            "SELECT ba.user_id, ba.last_attempt, u.telegram_id, u.first_name, u.username \
             FROM bonus_attempts ba \
             INNER JOIN users u ON ba.user_id = u.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut elapsed = Vec::new();
        for (user_id, last_attempt, telegram_id, first_name, username) in rows {
            let next_available_at = last_attempt + cooldown();
            if next_available_at < window_start || next_available_at > window_end {
                continue;
            }
            let display_name = first_name
                .filter(|name| !name.is_empty())
                .or(username)
                .unwrap_or_else(|| "player".to_string());
            elapsed.push(ElapsedCooldown {
                user_id,
                telegram_id,
                display_name,
                next_available_at,
            });
        }
        Ok(elapsed)
    }
}
