//! Video preview shown before the resolution choice
//!
//! A single link is answered with the video's title, uploader, duration and
//! thumbnail, and the keyboard only offers heights the video actually has.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, InputFile, ParseMode};

use tubecore::core::utils::{escape_markdown_v2, format_duration, truncate_title};
use tubecore::download::resolution::Resolution;
use tubecore::download::source::MediaMetadata;

pub const FETCHING_TEXT: &str = "🔍 Fetching video information...";

/// Photo captions are capped at 1024 characters by Telegram
const MAX_TITLE_CHARS: usize = 200;

/// Keyboard choices the video offers. Every choice when the site reported none of them.
pub fn offered_resolutions(available: &[Resolution]) -> Vec<Resolution> {
    let offered: Vec<Resolution> = Resolution::CHOICES
        .iter()
        .copied()
        .filter(|choice| available.contains(choice))
        .collect();
    if offered.is_empty() {
        Resolution::CHOICES.to_vec()
    } else {
        offered
    }
}

/// MarkdownV2 caption of the preview.
pub fn preview_caption(metadata: &MediaMetadata) -> String {
    let title = if metadata.title.trim().is_empty() {
        "Untitled video"
    } else {
        metadata.title.as_str()
    };
    let mut caption = format!("🎬 *{}*\n", escape_markdown_v2(&truncate_title(title, MAX_TITLE_CHARS)));
    if let Some(uploader) = metadata.uploader.as_deref().filter(|u| !u.is_empty()) {
        caption.push_str(&format!("\n👤 {}", escape_markdown_v2(uploader)));
    }
    if let Some(duration) = metadata.duration_secs {
        caption.push_str(&format!("\n🕒 Duration: {}", format_duration(duration)));
    }
    if metadata.is_live {
        caption.push_str("\n🔴 This is a live stream and can't be downloaded\\.");
    }
    caption.push_str("\n\n👇 Choose a resolution:");
    caption
}

/// Sends the preview, as a photo when the thumbnail can be fetched.
pub async fn send_video_preview(
    bot: &Bot,
    chat_id: ChatId,
    metadata: &MediaMetadata,
    keyboard: InlineKeyboardMarkup,
) -> ResponseResult<Message> {
    let caption = preview_caption(metadata);

    if let Some(thumbnail) = metadata.thumbnail_url.as_deref() {
        match fetch_thumbnail(thumbnail).await {
            Ok(bytes) => {
                log::debug!("Sending preview photo ({} bytes) to chat {}", bytes.len(), chat_id);
                return bot
                    .send_photo(chat_id, InputFile::memory(bytes))
                    .caption(caption)
                    .parse_mode(ParseMode::MarkdownV2)
                    .reply_markup(keyboard)
                    .await;
            }
            Err(e) => log::warn!("Failed to download thumbnail {}: {}", thumbnail, e),
        }
    }

    bot.send_message(chat_id, caption)
        .parse_mode(ParseMode::MarkdownV2)
        .reply_markup(keyboard)
        .await
}

async fn fetch_thumbnail(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = reqwest::get(url).await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
