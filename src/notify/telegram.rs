//! Telegram notification sink.
//!
//! Uses a teloxide `Bot` directly (send-only, no dispatcher). Every message
//! goes to all configured chats, prefixed with the configured label.

use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::warn;

use super::Notifier;
use crate::error::NotifyError;

/// Sends watchdog notifications to Telegram chats.
pub struct TelegramNotifier {
    bot: Bot,
    notify_users: Vec<i64>,
    prefix: String,
}

impl TelegramNotifier {
    /// Create a notifier for `notify_users` using `bot_token`.
    pub fn new(bot_token: &str, notify_users: Vec<i64>, prefix: String) -> Self {
        Self {
            bot: Bot::new(bot_token),
            notify_users,
            prefix,
        }
    }

    /// Chats that receive notifications.
    pub fn notify_users(&self) -> &[i64] {
        &self.notify_users
    }

    /// Render the outgoing text for `message`.
    pub fn format(&self, message: &str) -> String {
        if self.prefix.is_empty() {
            message.to_owned()
        } else {
            format!("{}: {message}", self.prefix)
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn publish(&self, message: &str) -> Result<(), NotifyError> {
        if self.notify_users.is_empty() {
            return Ok(());
        }

        let text = self.format(message);
        let mut any_sent = false;
        for &user_id in &self.notify_users {
            match self.bot.send_message(ChatId(user_id), text.as_str()).await {
                Ok(_) => any_sent = true,
                Err(e) => warn!(user_id, error = %e, "failed to send Telegram message"),
            }
        }

        if !any_sent {
            return Err(NotifyError::Transport(
                "failed to send Telegram message to any configured user".to_owned(),
            ));
        }
        Ok(())
    }
}
