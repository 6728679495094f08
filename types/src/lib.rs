//! Common types used throughout highrise.
//!
//! This crate holds the domain model for the bonus program: row types for
//! the five persistent tables, the bonus-accrual math and its cap, the
//! cooldown constant, and the promo-code alphabet and state machine. It
//! performs no I/O; everything here is deterministic and unit-testable.

pub mod api;
pub mod bonus;
pub mod promo;
pub mod user;

pub use bonus::{
    clip_accrual, compute_accrual, cooldown, required_deposit, GameMode, ParseGameModeError,
    BONUS_CAP, BONUS_COOLDOWN_SECS, BONUS_PER_NORMAL_PLACEMENT, BONUS_PER_PERFECT_PLACEMENT,
};
pub use promo::{
    generate_code, normalize_code, ParsePromoStatusError, PromoStatus, PROMO_CODE_ALPHABET,
    PROMO_CODE_LENGTH, PROMO_CODE_MAX_GENERATION_ATTEMPTS, PROMO_VALIDITY_DAYS,
};
pub use user::{
    is_placeholder_name, Advertisement, CooldownAttempt, DailyActivity, GameRecord, ProfileHint,
    PromoCode, User, UserInvariantError,
};
