use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use highrise_types::api::{PromoGrant, PromoRedemption};
use highrise_types::{
    generate_code, normalize_code, required_deposit, PromoCode, PromoStatus,
    PROMO_CODE_MAX_GENERATION_ATTEMPTS, PROMO_VALIDITY_DAYS,
};

use crate::error::is_unique_violation;
use crate::{Engine, EngineError};

const PROMO_COLUMNS: &str =
    "id, code, user_id, bonuses_amount, required_deposit, status, \
     created_at, expires_at, used_at, used_by_admin_id";

impl Engine {
    /// Convert the banked balance into a single-use voucher.
    ///
    /// The balance snapshot is zeroed in the same transaction that inserts
    /// the code; activation later never touches the balance again, so
    /// bonuses accrued after creation are unaffected. Code collisions are
    /// retried with a fresh draw up to a fixed bound.
    pub async fn create_promo_code(
        &self,
        user_id: i64,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<PromoGrant, EngineError> {
        let lock = self.locks.lock_for(user_id);
        let _guard = lock.lock().await;

        let (balance, _, _) = self.user_aggregates(user_id).await?;
        if amount > balance {
            return Err(EngineError::InsufficientBalance {
                requested: amount,
                available: balance,
            });
        }

        let deposit = required_deposit(amount);
        let expires_at = now + Duration::days(PROMO_VALIDITY_DAYS);

        for attempt in 1..=PROMO_CODE_MAX_GENERATION_ATTEMPTS {
            let code = {
                let mut rng = rand::thread_rng();
                generate_code(&mut rng)
            };
            match self
                .try_insert_promo(user_id, amount, deposit, &code, now, expires_at)
                .await?
            {
                Some(grant) => {
                    info!(user_id, code = %grant.code, amount, "promo code created");
                    return Ok(grant);
                }
                None => debug!(user_id, attempt, "promo code collision, redrawing"),
            }
        }

        Err(EngineError::CodeGenerationExhausted {
            attempts: PROMO_CODE_MAX_GENERATION_ATTEMPTS,
        })
    }

    /// One zero-balance-plus-insert attempt. `Ok(None)` means the drawn
    /// code collided and the whole transaction rolled back; the caller
    /// redraws and retries.
    pub(crate) async fn try_insert_promo(
        &self,
        user_id: i64,
        amount: i64,
        deposit: i64,
        code: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<PromoGrant>, EngineError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE users SET total_bonuses = 0 WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let inserted = sqlx::query(
            "INSERT INTO promo_codes \
             (code, user_id, bonuses_amount, required_deposit, status, created_at, expires_at) \
             VALUES (?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(code)
        .bind(user_id)
        .bind(amount)
        .bind(deposit)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                Ok(Some(PromoGrant {
                    code: code.to_string(),
                    bonuses_amount: amount,
                    required_deposit: deposit,
                    expires_at,
                }))
            }
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Admin-side redemption of a voucher. Lookup is case-insensitive.
    ///
    /// An expiry observed here is persisted (`pending -> expired`) before
    /// the error is returned, so later accesses see the terminal state
    /// without re-deriving it from the clock.
    pub async fn activate_promo_code(
        &self,
        code_raw: &str,
        admin_id: i64,
        now: DateTime<Utc>,
    ) -> Result<PromoRedemption, EngineError> {
        let code = normalize_code(code_raw);
        let promo = self
            .promo_code(&code)
            .await?
            .ok_or(EngineError::PromoNotFound)?;

        match promo.status {
            PromoStatus::Used => return Err(EngineError::PromoAlreadyUsed),
            PromoStatus::Expired => return Err(EngineError::PromoExpired),
            PromoStatus::Pending => {}
        }

        if now > promo.expires_at {
            sqlx::query("UPDATE promo_codes SET status = 'expired' WHERE id = ?")
                .bind(promo.id)
                .execute(&self.pool)
                .await?;
            return Err(EngineError::PromoExpired);
        }

        // The status guard in the WHERE clause makes concurrent double
        // activation lose cleanly instead of double-marking.
        let updated = sqlx::query(
            "UPDATE promo_codes SET status = 'used', used_at = ?, used_by_admin_id = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(now)
        .bind(admin_id)
        .bind(promo.id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(EngineError::PromoAlreadyUsed);
        }

        info!(code = %promo.code, admin_id, user_id = promo.user_id, "promo code activated");
        Ok(PromoRedemption {
            code: promo.code,
            bonuses_amount: promo.bonuses_amount,
            required_deposit: promo.required_deposit,
            user_id: promo.user_id,
        })
    }

    /// Fetch a promo code by its canonical form.
    pub async fn promo_code(&self, code: &str) -> Result<Option<PromoCode>, EngineError> {
        let sql = format!("SELECT {PROMO_COLUMNS} FROM promo_codes WHERE code = ?");
        let promo = sqlx::query_as::<_, PromoCode>(&sql)
            .bind(normalize_code(code))
            .fetch_optional(&self.pool)
            .await?;
        Ok(promo)
    }
}
