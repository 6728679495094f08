use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use highrise_types::{is_placeholder_name, ProfileHint, User};

use crate::error::is_unique_violation;
use crate::{Engine, EngineError};

const USER_COLUMNS: &str =
    "id, telegram_id, username, first_name, last_name, created_at, \
     total_bonuses, total_games, best_score";

impl Engine {
    /// Idempotent get-or-create keyed by the external (Telegram) id.
    ///
    /// Two simultaneous first contacts resolve to a single row: the loser
    /// of the insert race observes the uniqueness violation and re-reads
    /// the row the winner created. Every contact also refreshes today's
    /// activity row.
    pub async fn get_or_create_user(
        &self,
        hint: &ProfileHint,
        now: DateTime<Utc>,
    ) -> Result<User, EngineError> {
        let user = match self.user_by_telegram_id(hint.telegram_id).await? {
            Some(existing) => self.reconcile_profile(existing, hint).await?,
            None => self.create_user(hint, now).await?,
        };

        // Reporting-only; a failed activity write must not fail the contact.
        if let Err(err) = self.touch_activity(user.id, now).await {
            warn!(user_id = user.id, %err, "daily activity refresh failed");
        }

        Ok(user)
    }

    pub async fn user_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<User>, EngineError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn user_by_id(&self, user_id: i64) -> Result<User, EngineError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(EngineError::UserNotFound { user_id })
    }

    /// Resolve the caller: the external id must already be registered.
    pub async fn require_user_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<User, EngineError> {
        self.user_by_telegram_id(telegram_id)
            .await?
            .ok_or(EngineError::UserNotFound { user_id: telegram_id })
    }

    async fn create_user(
        &self,
        hint: &ProfileHint,
        now: DateTime<Utc>,
    ) -> Result<User, EngineError> {
        if is_placeholder_name(hint.first_name.as_deref()) {
            debug!(
                telegram_id = hint.telegram_id,
                "creating user with placeholder name"
            );
        }

        let insert = sqlx::query(
            "INSERT INTO users (telegram_id, username, first_name, last_name, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(hint.telegram_id)
        .bind(&hint.username)
        .bind(&hint.first_name)
        .bind(&hint.last_name)
        .bind(now)
        .execute(&self.pool)
        .await;

        match insert {
            Ok(_) => {}
            // Lost a creation race; the row exists now and we fall through
            // to read it.
            Err(err) if is_unique_violation(&err) => {
                debug!(telegram_id = hint.telegram_id, "user creation race recovered");
            }
            Err(err) => return Err(err.into()),
        }

        self.user_by_telegram_id(hint.telegram_id)
            .await?
            .ok_or(EngineError::Storage(sqlx::Error::RowNotFound))
    }

    /// Update display fields from a fresh hint. A real stored name is never
    /// downgraded to a placeholder; a placeholder is replaced as soon as a
    /// real name is observed.
    async fn reconcile_profile(
        &self,
        user: User,
        hint: &ProfileHint,
    ) -> Result<User, EngineError> {
        let hint_name = hint.first_name.as_deref();
        let update_name = !is_placeholder_name(hint_name)
            && (is_placeholder_name(user.first_name.as_deref())
                || hint_name != user.first_name.as_deref());
        let update_username = hint.username.is_some() && hint.username != user.username;

        if !update_name && !update_username {
            return Ok(user);
        }

        let first_name = if update_name {
            hint.first_name.clone()
        } else {
            user.first_name.clone()
        };
        let username = if update_username {
            hint.username.clone()
        } else {
            user.username.clone()
        };

        sqlx::query("UPDATE users SET username = ?, first_name = ? WHERE id = ?")
            .bind(&username)
            .bind(&first_name)
            .bind(user.id)
            .execute(&self.pool)
            .await?;

        Ok(User {
            username,
            first_name,
            ..user
        })
    }
}
