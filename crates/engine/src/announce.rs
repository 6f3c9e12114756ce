use std::time::Duration;

use futures_util::future::join_all;
use tracing::{info, warn};

use common::{Alert, Error, Notifier, PriceStats, Result, Subscriber, SubscriberSource};

/// Subscribers whose own threshold is met by `percent_change`.
pub fn recipients(subscribers: &[Subscriber], percent_change: f64) -> Vec<&Subscriber> {
    subscribers
        .iter()
        .filter(|s| s.wants(percent_change))
        .collect()
}

/// Send the alert for `stats` to every interested subscriber concurrently.
///
/// Each send is bounded by `timeout`. A failed or slow delivery is logged and
/// skipped; it never stops the others. Returns how many deliveries succeeded.
/// Only a failure to read the subscriber list is an error.
pub async fn announce(
    stats: &PriceStats,
    subscribers: &dyn SubscriberSource,
    notifier: &dyn Notifier,
    timeout: Duration,
) -> Result<usize> {
    let all = subscribers.enabled_subscribers().await?;
    let targets = recipients(&all, stats.percent_change);
    let alert = Alert::from(stats);

    let sends = targets.iter().map(|sub| {
        let alert = &alert;
        async move {
            let result = match tokio::time::timeout(timeout, notifier.notify(sub.id, alert)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Delivery {
                    subscriber_id: sub.id,
                    reason: format!("timed out after {timeout:?}"),
                }),
            };
            if let Err(e) = &result {
                warn!(subscriber_id = sub.id, error = %e, "Alert delivery failed");
            }
            result.is_ok()
        }
    });
    let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();

    info!(
        pair = %stats.pair,
        signal = %stats.signal,
        change_pct = stats.percent_change,
        recipients = targets.len(),
        delivered,
        "Price move announced"
    );
    Ok(delivered)
}
