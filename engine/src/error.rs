use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// The business-rule variants are expected, caller-recoverable outcomes
/// and are never logged as system failures; only `Storage` indicates
/// something actually went wrong.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("user {user_id} not found")]
    UserNotFound { user_id: i64 },

    #[error("insufficient balance (requested={requested}, available={available})")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("bonus game on cooldown until {next_available_at}")]
    AlreadyOnCooldown { next_available_at: DateTime<Utc> },

    #[error("promo code not found")]
    PromoNotFound,

    #[error("promo code already used")]
    PromoAlreadyUsed,

    #[error("promo code expired")]
    PromoExpired,

    #[error("promo code generation exhausted after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl EngineError {
    /// Expected, recoverable-by-caller conditions (cooldowns, balance
    /// guards, promo lifecycle outcomes).
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientBalance { .. }
                | EngineError::AlreadyOnCooldown { .. }
                | EngineError::PromoAlreadyUsed
                | EngineError::PromoExpired
                | EngineError::CodeGenerationExhausted { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::UserNotFound { .. } | EngineError::PromoNotFound
        )
    }
}

/// Whether a storage error is a uniqueness-constraint violation. Used to
/// recover user-creation races and to retry promo-code generation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
