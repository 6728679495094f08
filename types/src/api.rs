//! Typed results for the core operations, shared between the engine and
//! the API/notifier layers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Answer to "can this user start a bonus-mode game right now".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub can_play: bool,
    pub next_available_at: Option<DateTime<Utc>>,
}

impl Eligibility {
    pub fn open() -> Self {
        Self {
            can_play: true,
            next_available_at: None,
        }
    }

    pub fn blocked_until(next_available_at: DateTime<Utc>) -> Self {
        Self {
            can_play: false,
            next_available_at: Some(next_available_at),
        }
    }
}

/// Aggregates returned alongside every mutation of a user's stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_bonuses: i64,
    pub total_games: i64,
    pub best_score: i64,
    pub bonus_games_count: i64,
}

/// Result of persisting one game: the clipped accrual plus the balance on
/// both sides of the write (the notifier needs the crossing to congratulate
/// exactly once when the cap is reached).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOutcome {
    pub bonuses_earned: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub stats: UserStats,
}

/// Result of a direct exchange: the balance was zeroed and the club needs
/// this deposit before paying out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeReceipt {
    pub bonuses_exchanged: i64,
    pub required_deposit: i64,
    pub remaining_bonuses: i64,
}

/// A freshly minted promo code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoGrant {
    pub code: String,
    pub bonuses_amount: i64,
    pub required_deposit: i64,
    pub expires_at: DateTime<Utc>,
}

/// Result of an admin activating a promo code; the payout itself happens
/// off-system at the club desk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoRedemption {
    pub code: String,
    pub bonuses_amount: i64,
    pub required_deposit: i64,
    pub user_id: i64,
}

/// Leaderboard row, ordered by best score then banked bonuses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub best_score: i64,
    pub total_bonuses: i64,
    pub total_games: i64,
}

/// A user whose cooldown elapses inside the sweep window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElapsedCooldown {
    pub user_id: i64,
    pub telegram_id: i64,
    pub display_name: String,
    pub next_available_at: DateTime<Utc>,
}

/// One user's row in the per-day activity report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivityRow {
    pub user_id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub games_played: i64,
}

/// Per-day rollup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub total_users: i64,
    pub total_games: i64,
    pub active_users: i64,
}

/// All-time rollup for the admin dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AllTimeStats {
    pub total_users: i64,
    pub total_games: i64,
    pub total_bonuses: i64,
    pub best_score: i64,
    pub active_users: i64,
    pub new_users_7d: i64,
    pub new_users_30d: i64,
}

/// Admin listing row: a user with a derived games count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserWithStats {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub total_games: i64,
    pub total_bonuses: i64,
    pub best_score: i64,
    pub games_count: i64,
}

/// Recipient of an advertisement broadcast.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct BroadcastTarget {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}
