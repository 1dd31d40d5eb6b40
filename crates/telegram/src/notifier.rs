use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::debug;

use common::{Error, Notifier, Result};

/// Delivers alerts to one Telegram chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self { bot, chat_id: ChatId(chat_id) }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        self.bot
            .send_message(self.chat_id, text)
            .await
            .map_err(|e| Error::Delivery(e.to_string()))?;
        Ok(())
    }

    async fn send_photo(&self, png: Vec<u8>, caption: &str) -> Result<()> {
        debug!(bytes = png.len(), chat_id = self.chat_id.0, "Sending chart");
        let photo = InputFile::memory(png).file_name("chart.png");
        self.bot
            .send_photo(self.chat_id, photo)
            .caption(caption)
            .await
            .map_err(|e| Error::Delivery(e.to_string()))?;
        Ok(())
    }
}
