//! Delivers finished videos to the chat

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};

use tubecore::core::error::AppResult;
use tubecore::download::error::UploadError;
use tubecore::download::pipeline::{MediaUploader, UploadRequest};

#[derive(Clone)]
pub struct TelegramUploader {
    bot: Bot,
}

impl TelegramUploader {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MediaUploader for TelegramUploader {
    async fn upload_video(&self, request: &UploadRequest) -> AppResult<()> {
        log::info!(
            "📤 Uploading {} ({} bytes) to chat {}",
            request.file_path.display(),
            request.file_size,
            request.chat_id
        );

        let mut send = self
            .bot
            .send_video(ChatId(request.chat_id), InputFile::file(&request.file_path))
            .caption(request.caption.clone())
            .parse_mode(ParseMode::MarkdownV2)
            .supports_streaming(true);
        if let Some(duration) = request.duration_secs.and_then(|d| u32::try_from(d).ok()) {
            send = send.duration(duration);
        }
        if let Some(thumbnail) = &request.thumbnail_path {
            send = send.thumbnail(InputFile::file(thumbnail));
        }

        match send.await {
            Ok(_) => Ok(()),
            Err(teloxide::RequestError::Api(api_error)) => Err(UploadError::Rejected(api_error.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }
}
