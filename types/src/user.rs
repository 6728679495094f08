use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;

use crate::bonus::BONUS_CAP;
use crate::promo::PromoStatus;

/// First names that upstream clients substitute when the real name is
/// unknown. They are persisted on first contact but must never overwrite
/// a real name once one has been observed.
pub const PLACEHOLDER_FIRST_NAMES: [&str; 2] = ["Demo", "Игрок"];

/// Whether a first-name value should be treated as "unset".
pub fn is_placeholder_name(name: Option<&str>) -> bool {
    match name {
        None => true,
        Some(value) => value.is_empty() || PLACEHOLDER_FIRST_NAMES.contains(&value),
    }
}

/// Profile fields accompanying an inbound request, as reported by the
/// messenger. Any of the display fields may be a placeholder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileHint {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserInvariantError {
    #[error("balance out of range (got={got}, cap={cap})")]
    BalanceOutOfRange { got: i64, cap: i64 },
    #[error("negative lifetime counter (games={games}, best_score={best_score})")]
    NegativeCounter { games: i64, best_score: i64 },
}

/// A registered user. Created on first contact, never deleted.
///
/// `total_bonuses` is the banked balance (drawn down to zero on
/// redemption), not a lifetime-earned total.
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub total_bonuses: i64,
    pub total_games: i64,
    pub best_score: i64,
}

impl User {
    pub fn validate_invariants(&self) -> Result<(), UserInvariantError> {
        if self.total_bonuses < 0 || self.total_bonuses > BONUS_CAP {
            return Err(UserInvariantError::BalanceOutOfRange {
                got: self.total_bonuses,
                cap: BONUS_CAP,
            });
        }
        if self.total_games < 0 || self.best_score < 0 {
            return Err(UserInvariantError::NegativeCounter {
                games: self.total_games,
                best_score: self.best_score,
            });
        }
        Ok(())
    }

    /// Name shown in notifications: first name, else username, else a
    /// generic fallback.
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.username.as_deref())
            .unwrap_or("player")
    }
}

/// One finished game. Append-only: `bonuses_earned` records the
/// cap-clipped amount actually credited and is never rewritten.
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize)]
pub struct GameRecord {
    pub id: i64,
    pub user_id: i64,
    pub mode: String,
    pub score: i64,
    pub floors: i64,
    pub bonuses_earned: i64,
    pub played_at: DateTime<Utc>,
}

/// The single cooldown row per user: timestamp of the most recent
/// bonus-mode attempt start. Absence means "never attempted".
#[derive(Clone, Debug, PartialEq, Eq, FromRow)]
pub struct CooldownAttempt {
    pub user_id: i64,
    pub last_attempt: DateTime<Utc>,
}

/// A redemption voucher for an already-debited bonus amount.
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize)]
pub struct PromoCode {
    pub id: i64,
    pub code: String,
    pub user_id: i64,
    pub bonuses_amount: i64,
    pub required_deposit: i64,
    pub status: PromoStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by_admin_id: Option<i64>,
}

/// Per-(user, UTC date) activity row, upserted on every contact.
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize)]
pub struct DailyActivity {
    pub user_id: i64,
    pub date: NaiveDate,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub games_played: i64,
}

/// An admin announcement, broadcast to a filtered set of users.
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize)]
pub struct Advertisement {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub sent_count: i64,
    pub target_all_users: bool,
    pub min_games: i64,
    pub min_bonuses: i64,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 1,
            telegram_id: 777,
            username: Some("tester".to_string()),
            first_name: Some("Alex".to_string()),
            last_name: None,
            created_at: Utc::now(),
            total_bonuses: 0,
            total_games: 0,
            best_score: 0,
        }
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder_name(None));
        assert!(is_placeholder_name(Some("")));
        assert!(is_placeholder_name(Some("Demo")));
        assert!(is_placeholder_name(Some("Игрок")));
        assert!(!is_placeholder_name(Some("Alex")));
    }

    #[test]
    fn test_validate_rejects_balance_out_of_range() {
        let mut user = sample_user();
        user.total_bonuses = BONUS_CAP + 1;
        assert!(matches!(
            user.validate_invariants(),
            Err(UserInvariantError::BalanceOutOfRange { .. })
        ));
        user.total_bonuses = -1;
        assert!(matches!(
            user.validate_invariants(),
            Err(UserInvariantError::BalanceOutOfRange { .. })
        ));
        user.total_bonuses = BONUS_CAP;
        assert!(user.validate_invariants().is_ok());
    }

    #[test]
    fn test_display_name_fallback_chain() {
        let mut user = sample_user();
        assert_eq!(user.display_name(), "Alex");
        user.first_name = None;
        assert_eq!(user.display_name(), "tester");
        user.username = None;
        assert_eq!(user.display_name(), "player");
    }
}
