use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hard ceiling on a user's banked bonus balance.
pub const BONUS_CAP: i64 = 500;

/// Bonus credited per regular block placement.
pub const BONUS_PER_NORMAL_PLACEMENT: i64 = 1;

/// Bonus credited per perfect block placement.
pub const BONUS_PER_PERFECT_PLACEMENT: i64 = 2;

/// Minimum interval between bonus-mode attempts.
///
/// This is intentionally a single hardcoded constant with no configuration
/// counterpart: the gate always enforces exactly 24 hours.
pub const BONUS_COOLDOWN_SECS: i64 = 24 * 60 * 60;

/// The cooldown as a [`chrono::Duration`].
pub fn cooldown() -> chrono::Duration {
    chrono::Duration::seconds(BONUS_COOLDOWN_SECS)
}

/// Declared mode of a single game session.
///
/// Both modes accrue bonuses identically; `Bonus` only gates eligibility
/// (via the cooldown) and the completion notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Normal,
    Bonus,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Normal => "normal",
            GameMode::Bonus => "bonus",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown game mode {0:?}")]
pub struct ParseGameModeError(pub String);

impl FromStr for GameMode {
    type Err = ParseGameModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(GameMode::Normal),
            "bonus" => Ok(GameMode::Bonus),
            other => Err(ParseGameModeError(other.to_string())),
        }
    }
}

/// Raw bonus amount earned by a game, before the cap is applied.
pub fn compute_accrual(normal_count: u32, perfect_count: u32) -> i64 {
    i64::from(normal_count) * BONUS_PER_NORMAL_PLACEMENT
        + i64::from(perfect_count) * BONUS_PER_PERFECT_PLACEMENT
}

/// Portion of `raw` that can actually be credited on top of `balance`
/// without exceeding [`BONUS_CAP`]. Never negative.
pub fn clip_accrual(balance: i64, raw: i64) -> i64 {
    raw.min(BONUS_CAP - balance).max(0)
}

/// Deposit required to redeem `amount` bonuses: 50%, rounded half up.
pub fn required_deposit(amount: i64) -> i64 {
    debug_assert!(amount >= 0);
    (amount + 1) / 2
}
