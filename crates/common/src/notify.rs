use async_trait::async_trait;

use crate::{Alert, Result, Subscriber};

/// Read-only view of the users who opted into alerts.
#[async_trait]
pub trait SubscriberSource: Send + Sync {
    async fn enabled_subscribers(&self) -> Result<Vec<Subscriber>>;
}

/// Delivers an alert to one subscriber.
///
/// `TelegramNotifier` implements this for the chat bot. A failed delivery is
/// reported as `Error::Delivery` and must not affect other subscribers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subscriber_id: i64, alert: &Alert) -> Result<()>;
}
