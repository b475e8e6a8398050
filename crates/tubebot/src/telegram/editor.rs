//! Telegram side of progress reporting

use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};

use tubecore::core::error::AppResult;
use tubecore::core::utils::extract_retry_after;
use tubecore::download::reporter::MessageEditor;

/// Sends and edits MarkdownV2 messages.
///
/// "message is not modified" counts as success. A rate-limited edit waits
/// the requested time and tries once more.
#[derive(Clone)]
pub struct TelegramEditor {
    bot: Bot,
}

impl TelegramEditor {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn try_edit(&self, chat_id: i64, message_id: i32, text: &str) -> Result<(), teloxide::RequestError> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        Ok(())
    }
}

pub(crate) fn is_not_modified(error_text: &str) -> bool {
    error_text.contains("message is not modified")
}

#[async_trait]
impl MessageEditor for TelegramEditor {
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<i32> {
        let msg = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        Ok(msg.id.0)
    }

    async fn edit(&self, chat_id: i64, message_id: i32, text: &str) -> AppResult<()> {
        let error = match self.try_edit(chat_id, message_id, text).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        let error_text = error.to_string();
        if is_not_modified(&error_text) {
            return Ok(());
        }

        let Some(retry_after_secs) = extract_retry_after(&error_text) else {
            return Err(error.into());
        };
        log::warn!(
            "Rate limit hit when editing message: Retry after {}s. Waiting...",
            retry_after_secs
        );
        tokio::time::sleep(Duration::from_secs(retry_after_secs + 1)).await;

        match self.try_edit(chat_id, message_id, text).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_modified(&e.to_string()) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
