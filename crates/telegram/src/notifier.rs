use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, warn};

use common::{Alert, Error, Notifier, Result};

use crate::messages;

/// Delivers price alerts as direct Telegram messages.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, subscriber_id: i64, alert: &Alert) -> Result<()> {
        self.bot
            .send_message(ChatId(subscriber_id), messages::alert(alert))
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .await
            .map_err(|e| Error::Delivery {
                subscriber_id,
                reason: e.to_string(),
            })?;
        debug!(subscriber_id, pair = %alert.pair, "Alert delivered");
        Ok(())
    }
}

/// Send an HTML notice to every chat in `chat_ids`, logging failures.
pub async fn send_alert(bot: &Bot, chat_ids: &[i64], message: &str) {
    for &chat_id in chat_ids {
        if let Err(e) = bot
            .send_message(ChatId(chat_id), message)
            .parse_mode(ParseMode::Html)
            .await
        {
            warn!(chat_id, error = %e, "Failed to send Telegram notice");
        }
    }
}
