use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a generated promo code.
pub const PROMO_CODE_LENGTH: usize = 8;

/// Code alphabet: 32 symbols, excluding visually ambiguous `0 O I 1`.
pub const PROMO_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generation retries on a uniqueness collision before giving up.
pub const PROMO_CODE_MAX_GENERATION_ATTEMPTS: u32 = 10;

/// Days a promo code stays redeemable after creation.
pub const PROMO_VALIDITY_DAYS: i64 = 7;

/// Lifecycle of a promo code. Transitions are one-way and terminal:
/// `Pending -> Used` on activation, `Pending -> Expired` on an activation
/// attempt (or any access) past the expiry time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PromoStatus {
    Pending,
    Used,
    Expired,
}

impl PromoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoStatus::Pending => "pending",
            PromoStatus::Used => "used",
            PromoStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for PromoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown promo status {0:?}")]
pub struct ParsePromoStatusError(pub String);

impl FromStr for PromoStatus {
    type Err = ParsePromoStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PromoStatus::Pending),
            "used" => Ok(PromoStatus::Used),
            "expired" => Ok(PromoStatus::Expired),
            other => Err(ParsePromoStatusError(other.to_string())),
        }
    }
}

/// Draw a fresh candidate code. Uniqueness is enforced by the store, not
/// here; callers retry on collision.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..PROMO_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..PROMO_CODE_ALPHABET.len());
            PROMO_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Canonical form used for storage and lookup: trimmed, uppercase.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_alphabet_excludes_confusable_characters() {
        for banned in [b'0', b'O', b'I', b'1'] {
            assert!(!PROMO_CODE_ALPHABET.contains(&banned));
        }
        assert_eq!(PROMO_CODE_ALPHABET.len(), 32);
    }

    #[test]
    fn test_generated_code_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), PROMO_CODE_LENGTH);
            assert!(code.bytes().all(|b| PROMO_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" abCD2345 "), "ABCD2345");
        assert_eq!(normalize_code("WXYZ9876"), "WXYZ9876");
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [PromoStatus::Pending, PromoStatus::Used, PromoStatus::Expired] {
            let parsed: PromoStatus = status.as_str().parse().unwrap();
            assert_eq!(status, parsed);
        }
        assert!("revoked".parse::<PromoStatus>().is_err());
    }
}
