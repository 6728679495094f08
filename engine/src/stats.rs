use highrise_types::api::{LeaderboardEntry, UserStats, UserWithStats};
use highrise_types::GameRecord;

use crate::{Engine, EngineError};

impl Engine {
    /// Current aggregates for one user, including the derived bonus-game
    /// count. Read-only.
    pub async fn user_stats(&self, user_id: i64) -> Result<UserStats, EngineError> {
        let (total_bonuses, total_games, best_score) = self.user_aggregates(user_id).await?;
        let bonus_games_count = self.bonus_games_count(user_id).await?;
        Ok(UserStats {
            total_bonuses,
            total_games,
            best_score,
            bonus_games_count,
        })
    }

    pub(crate) async fn bonus_games_count(&self, user_id: i64) -> Result<i64, EngineError> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(id) FROM games WHERE user_id = ? AND mode = 'bonus'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Top players by best score, banked bonuses breaking ties. Users who
    /// never scored are omitted.
    pub async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            "SELECT id, telegram_id, username, first_name, best_score, total_bonuses, total_games \
             FROM users \
             WHERE best_score > 0 \
             ORDER BY best_score DESC, total_bonuses DESC \
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// 1-based position under the same ordering as [`Engine::leaderboard`].
    pub async fn user_rank(&self, user_id: i64) -> Result<i64, EngineError> {
        let (rank,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) + 1 FROM users u \
             WHERE u.best_score > (SELECT best_score FROM users WHERE id = ?) \
                OR (u.best_score = (SELECT best_score FROM users WHERE id = ?) \
                    AND u.total_bonuses > (SELECT total_bonuses FROM users WHERE id = ?))",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(rank)
    }

    /// Latest bonus-mode games for one user, newest first.
    pub async fn bonus_game_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<GameRecord>, EngineError> {
        let games = sqlx::query_as::<_, GameRecord>(
            "SELECT id, user_id, mode, score, floors, bonuses_earned, played_at \
             FROM games \
             WHERE user_id = ? AND mode = 'bonus' \
             ORDER BY played_at DESC \
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(games)
    }

    /// Paged user listing for the admin dashboard, most active first.
    pub async fn users_with_stats(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserWithStats>, EngineError> {
        let users = sqlx::query_as::<_, UserWithStats>(
            "SELECT u.id, u.telegram_id, u.username, u.first_name, u.created_at, \
                    u.total_games, u.total_bonuses, u.best_score, \
                    (SELECT COUNT(id) FROM games WHERE user_id = u.id) AS games_count \
             FROM users u \
             ORDER BY u.total_games DESC, u.best_score DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
