use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use highrise_engine::{Engine, EngineError};
use highrise_types::Advertisement;

use crate::notify::Notifier;

/// Pause between consecutive sends, keeping the fan-out under the
/// messenger's rate limits.
pub const INTER_SEND_DELAY: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub sent: i64,
    pub errors: i64,
    pub total: i64,
}

/// Fan an advertisement out to its target users. Every delivery attempt is
/// logged to the store; a failed recipient is counted and skipped, never
/// fatal to the batch.
pub async fn send_advertisement(
    engine: &Engine,
    notifier: &Notifier,
    ad: &Advertisement,
) -> Result<BroadcastReport, EngineError> {
    let targets = engine.broadcast_targets(ad).await?;
    let total = targets.len() as i64;
    let mut report = BroadcastReport {
        total,
        ..Default::default()
    };

    let text = format!("\u{1F4E2} <b>{}</b>\n\n{}", ad.title, ad.message);
    for target in targets {
        match notifier.send_message(target.telegram_id, &text).await {
            Ok(()) => {
                report.sent += 1;
                engine
                    .log_advertisement_send(ad.id, target.id, "sent", None, Utc::now())
                    .await?;
            }
            Err(err) => {
                report.errors += 1;
                notifier.log_failure("broadcast", target.telegram_id, &err);
                let message = err.to_string();
                if let Err(log_err) = engine
                    .log_advertisement_send(ad.id, target.id, "error", Some(&message), Utc::now())
                    .await
                {
                    warn!(ad_id = ad.id, user_id = target.id, %log_err, "delivery log write failed");
                }
            }
        }
        tokio::time::sleep(INTER_SEND_DELAY).await;
    }

    engine
        .mark_advertisement_sent(ad.id, report.sent, Utc::now())
        .await?;
    info!(
        ad_id = ad.id,
        sent = report.sent,
        errors = report.errors,
        total = report.total,
        "advertisement broadcast finished"
    );
    Ok(report)
}
