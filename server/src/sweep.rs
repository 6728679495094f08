use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use highrise_engine::{Engine, EngineError};

use crate::notify::{bonus_available_message, Notifier};

/// How often the sweep runs.
pub const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

/// Tolerance around "cooldown just elapsed": a candidate is anyone whose
/// gate opens within this many minutes of the sweep tick, either side.
pub const SWEEP_TOLERANCE_MINUTES: i64 = 10;

/// Spawn the hourly availability sweep. The first pass runs immediately.
/// A failed pass is logged and the loop carries on; the sweep can never
/// take the process down.
pub fn spawn(
    engine: Arc<Engine>,
    notifier: Arc<Notifier>,
    frontend_url: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match run_once(&engine, &notifier, &frontend_url, Utc::now()).await {
                Ok(sent) => info!(sent, "cooldown sweep complete"),
                Err(err) => error!(%err, "cooldown sweep failed"),
            }
        }
    })
}

/// One sweep pass: find users whose cooldown elapses inside the tolerance
/// window, re-check eligibility (the window looks slightly ahead), and
/// notify each. Read-only against the cooldown state; one recipient's
/// failure never aborts the batch.
pub async fn run_once(
    engine: &Engine,
    notifier: &Notifier,
    frontend_url: &str,
    now: DateTime<Utc>,
) -> Result<usize, EngineError> {
    if !notifier.is_enabled() {
        return Ok(0);
    }

    let tolerance = Duration::minutes(SWEEP_TOLERANCE_MINUTES);
    let candidates = engine
        .cooldowns_elapsed_between(now - tolerance, now + tolerance)
        .await?;
    if candidates.is_empty() {
        return Ok(0);
    }

    let mut sent = 0;
    for candidate in candidates {
        // The window reaches a few minutes into the future; only notify
        // users whose gate is open right now.
        let eligibility = engine.check_bonus_eligibility(candidate.user_id, now).await?;
        if !eligibility.can_play {
            continue;
        }

        let text = bonus_available_message(&candidate.display_name, frontend_url);
        match notifier.send_message(candidate.telegram_id, &text).await {
            Ok(()) => sent += 1,
            Err(err) => notifier.log_failure("cooldown-sweep", candidate.telegram_id, &err),
        }
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use highrise_types::ProfileHint;

    #[tokio::test]
    async fn test_sweep_without_notifier_is_a_noop() {
        let engine = Engine::open_in_memory().await.unwrap();
        let now = "2026-01-10T12:00:00Z".parse().unwrap();
        let user = engine
            .get_or_create_user(
                &ProfileHint {
                    telegram_id: 1,
                    username: None,
                    first_name: Some("Alex".to_string()),
                    last_name: None,
                },
                now,
            )
            .await
            .unwrap();
        engine.record_bonus_attempt(user.id, now).await.unwrap();

        let due = now + Duration::hours(24);
        let sent = run_once(&engine, &Notifier::disabled(), "https://game.example.com", due)
            .await
            .unwrap();
        assert_eq!(sent, 0);

        // The sweep never consumes or moves the attempt row.
        let eligibility = engine.check_bonus_eligibility(user.id, due).await.unwrap();
        assert!(eligibility.can_play);
    }
}
