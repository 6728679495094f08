use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;
use thiserror::Error;
use tracing::{debug, error};

use highrise_types::BONUS_CAP;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier is disabled (no bot token)")]
    Disabled,
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram api rejected the message: {description}")]
    Api { description: String },
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// Per-category limiter for failure logging: repeated delivery errors of
/// one kind produce at most one error-level line per minute, the rest
/// drop to debug. Owned here rather than living in ambient global state.
pub struct ErrorThrottle {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl ErrorThrottle {
    pub fn new() -> Self {
        let once_per_minute = Quota::per_minute(NonZeroU32::new(1).expect("nonzero quota"));
        Self {
            limiter: RateLimiter::keyed(once_per_minute),
        }
    }

    pub fn allow(&self, category: &str) -> bool {
        self.limiter.check_key(&category.to_string()).is_ok()
    }
}

impl Default for ErrorThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound Telegram messenger. Construction with no token yields a
/// disabled notifier: every send returns [`NotifyError::Disabled`] and the
/// rest of the system carries on.
pub struct Notifier {
    client: Option<TelegramClient>,
    throttle: ErrorThrottle,
}

struct TelegramClient {
    http: reqwest::Client,
    token: String,
}

impl Notifier {
    pub fn new(token: Option<String>) -> Self {
        let client = token
            .filter(|token| !token.trim().is_empty())
            .map(|token| TelegramClient {
                http: reqwest::Client::new(),
                token,
            });
        Self {
            client,
            throttle: ErrorThrottle::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Send one HTML-formatted message to a chat.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let Some(client) = &self.client else {
            return Err(NotifyError::Disabled);
        };

        let url = format!("https://api.telegram.org/bot{}/sendMessage", client.token);
        let response = client
            .http
            .post(&url)
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await?;

        let body: TelegramResponse = response.json().await?;
        if !body.ok {
            return Err(NotifyError::Api {
                description: body
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(())
    }

    /// Record a delivery failure without spamming the log: one error line
    /// per category per minute, the rest at debug.
    pub fn log_failure(&self, category: &str, chat_id: i64, err: &NotifyError) {
        if self.throttle.allow(category) {
            error!(category, chat_id, %err, "notification delivery failed");
        } else {
            debug!(category, chat_id, %err, "notification delivery failed (throttled)");
        }
    }
}

/// Ten-segment progress bar toward the balance cap.
fn progress_bar(balance: i64) -> String {
    let filled = ((balance.clamp(0, BONUS_CAP) * 10) / BONUS_CAP) as usize;
    let mut bar = "\u{1F7E9}".repeat(filled);
    bar.push_str(&"\u{2B1C}".repeat(10 - filled));
    bar
}

/// Pushed after every bonus-mode game, even when nothing was credited.
pub fn bonus_game_completed_message(name: &str, earned: i64, balance: i64) -> String {
    let remaining = (BONUS_CAP - balance).max(0);
    let tail = if remaining > 0 {
        format!("{remaining} more to reach the cap.")
    } else {
        "You reached the cap. Time to redeem!".to_string()
    };
    format!(
        "<b>{name}, your bonus game is complete!</b>\n\
         Earned this game: <b>{earned}</b>\n\
         Banked: <b>{balance} / {cap}</b>\n\
         {bar}\n\
         {tail}\n\
         Reminder: the bonus game opens once every 24 hours.",
        cap = BONUS_CAP,
        bar = progress_bar(balance),
    )
}

/// Pushed exactly once, on the save that lifts the balance to the cap.
pub fn cap_reached_message(name: &str) -> String {
    format!(
        "<b>Congratulations, {name}!</b>\n\
         You banked the full <b>{cap}</b> bonuses.\n\
         Visit the club desk, deposit 50% of the amount, and collect your \
         reward. New bonuses accrue again after redemption.",
        cap = BONUS_CAP,
    )
}

/// Pushed by the hourly sweep when a user's cooldown has just elapsed.
pub fn bonus_available_message(name: &str, frontend_url: &str) -> String {
    format!(
        "<b>{name}, the bonus game is open again!</b>\n\
         Regular block: +1 bonus, perfect block: +2, cap: {cap}.\n\
         Play here: {frontend_url}",
        cap = BONUS_CAP,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_segments() {
        assert_eq!(progress_bar(0), "\u{2B1C}".repeat(10));
        assert_eq!(progress_bar(BONUS_CAP), "\u{1F7E9}".repeat(10));
        let half = progress_bar(BONUS_CAP / 2);
        assert_eq!(half.matches('\u{1F7E9}').count(), 5);
        assert_eq!(half.matches('\u{2B1C}').count(), 5);
    }

    #[test]
    fn test_completed_message_mentions_remaining() {
        let text = bonus_game_completed_message("Alex", 12, 480);
        assert!(text.contains("12"));
        assert!(text.contains("480 / 500"));
        assert!(text.contains("20 more"));

        let capped = bonus_game_completed_message("Alex", 2, 500);
        assert!(capped.contains("reached the cap"));
    }

    #[test]
    fn test_throttle_allows_once_per_category() {
        let throttle = ErrorThrottle::new();
        assert!(throttle.allow("sweep"));
        assert!(!throttle.allow("sweep"));
        // A different category is throttled independently.
        assert!(throttle.allow("broadcast"));
    }

    #[test]
    fn test_disabled_notifier() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        let with_blank_token = Notifier::new(Some("   ".to_string()));
        assert!(!with_blank_token.is_enabled());
        let with_token = Notifier::new(Some("123:abc".to_string()));
        assert!(with_token.is_enabled());
    }
}
