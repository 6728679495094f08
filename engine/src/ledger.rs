use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use highrise_types::api::{ExchangeReceipt, GameOutcome, UserStats};
use highrise_types::{clip_accrual, compute_accrual, required_deposit, GameMode, BONUS_CAP};

use crate::{Engine, EngineError};

impl Engine {
    /// Persist one finished game: clip the raw accrual against the cap,
    /// credit the balance, bump lifetime aggregates, and append the
    /// immutable game record, all in one transaction inside the user's
    /// critical section.
    ///
    /// Both modes accrue identically; the cooldown gate (not the ledger)
    /// is what distinguishes bonus mode.
    #[allow(clippy::too_many_arguments)]
    pub async fn save_game_result(
        &self,
        user_id: i64,
        mode: GameMode,
        score: i64,
        floors: i64,
        normal_count: u32,
        perfect_count: u32,
        now: DateTime<Utc>,
    ) -> Result<GameOutcome, EngineError> {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let (balance, total_games, best_score) = self.user_aggregates(user_id).await?;

        let raw = compute_accrual(normal_count, perfect_count);
        let clipped = clip_accrual(balance, raw);
        if clipped < raw {
            debug!(
                user_id,
                balance, raw, clipped, "accrual clipped at balance cap"
            );
        }

        let new_balance = balance + clipped;
        let new_games = total_games + 1;
        let new_best = best_score.max(score);
        debug_assert!(new_balance <= BONUS_CAP);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO games (user_id, mode, score, floors, bonuses_earned, played_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(mode.as_str())
        .bind(score)
        .bind(floors)
        .bind(clipped)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE users SET total_bonuses = ?, total_games = ?, best_score = ? WHERE id = ?",
        )
        .bind(new_balance)
        .bind(new_games)
        .bind(new_best)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        // Reporting-only counters; eventual consistency is acceptable here.
        // The save is itself a contact, so the day's row is made current
        // before the counter moves.
        if let Err(err) = self.touch_activity(user_id, now).await {
            warn!(user_id, %err, "daily activity refresh failed");
        }
        if let Err(err) = self.increment_daily_games(user_id, now.date_naive()).await {
            warn!(user_id, %err, "daily games counter update failed");
        }

        let bonus_games_count = self.bonus_games_count(user_id).await?;
        Ok(GameOutcome {
            bonuses_earned: clipped,
            balance_before: balance,
            balance_after: new_balance,
            stats: UserStats {
                total_bonuses: new_balance,
                total_games: new_games,
                best_score: new_best,
                bonus_games_count,
            },
        })
    }

    /// Direct (non-voucher) redemption: zero the whole banked balance and
    /// quote the deposit the club requires for the requested amount.
    pub async fn exchange_bonuses(
        &self,
        user_id: i64,
        amount: i64,
    ) -> Result<ExchangeReceipt, EngineError> {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let (balance, _, _) = self.user_aggregates(user_id).await?;
        if amount > balance {
            return Err(EngineError::InsufficientBalance {
                requested: amount,
                available: balance,
            });
        }

        sqlx::query("UPDATE users SET total_bonuses = 0 WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(ExchangeReceipt {
            bonuses_exchanged: amount,
            required_deposit: required_deposit(amount),
            remaining_bonuses: 0,
        })
    }

    pub(crate) async fn user_aggregates(
        &self,
        user_id: i64,
    ) -> Result<(i64, i64, i64), EngineError> {
        sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT total_bonuses, total_games, best_score FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(EngineError::UserNotFound { user_id })
    }
}
