//! Text messages with YouTube links

use teloxide::prelude::*;
use teloxide::types::Message;
use url::Url;

use tubecore::core::utils::extract_youtube_urls;

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::preview::{offered_resolutions, send_video_preview, FETCHING_TEXT};
use crate::telegram::selection::{resolution_keyboard, resolution_keyboard_with, PendingSelection};

pub const NOT_A_LINK_TEXT: &str = "❌ Please send a valid YouTube URL";
pub const UNKNOWN_COMMAND_TEXT: &str = "🤔 Unknown command. Use /help to see what I can do.";

/// Answers a link message with a resolution keyboard.
///
/// A single link gets a video preview first; several links form a batch and
/// get a plain prompt.
pub async fn handle_link_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    if text.trim_start().starts_with('/') {
        bot.send_message(chat_id, UNKNOWN_COMMAND_TEXT).await?;
        return Ok(());
    }

    let urls = extract_youtube_urls(text);
    if urls.is_empty() {
        bot.send_message(chat_id, NOT_A_LINK_TEXT).await?;
        return Ok(());
    }

    if let Err(e) = deps.rate_limiter.check(chat_id.0).await {
        log::warn!("Rate limit hit for chat {}: {}", chat_id, e);
        bot.send_message(chat_id, e.user_message()).await?;
        return Ok(());
    }

    log::info!("🔗 Chat {} sent {} link(s)", chat_id, urls.len());
    if let [url] = urls.as_slice() {
        return send_preview(bot, chat_id, url.clone(), deps).await;
    }

    let selection = PendingSelection::from_message(chat_id.0, urls);
    let prompt = selection.prompt();
    let token = deps.selections.insert(selection).await;

    bot.send_message(chat_id, prompt)
        .reply_markup(resolution_keyboard(&token, deps.settings.default_resolution))
        .await?;
    Ok(())
}

/// Fetches metadata for one link and answers with the preview and a keyboard
/// limited to the heights the video has.
async fn send_preview(bot: &Bot, chat_id: ChatId, url: Url, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let status = bot.send_message(chat_id, FETCHING_TEXT).await?;
    let cookies = deps.cookies.path_for(chat_id.0).await;

    let metadata = match deps.source.fetch_metadata(&url, cookies.as_deref()).await {
        Ok(metadata) => metadata,
        Err(e) => {
            log::warn!("Preview of {} for chat {} failed: {}", url, chat_id, e);
            bot.edit_message_text(chat_id, status.id, e.user_message()).await?;
            return Ok(());
        }
    };

    let choices = offered_resolutions(&metadata.available_heights);
    let token = deps
        .selections
        .insert(PendingSelection::from_message(chat_id.0, vec![url]))
        .await;
    let keyboard = resolution_keyboard_with(&token, deps.settings.default_resolution, &choices);
    send_video_preview(bot, chat_id, &metadata, keyboard).await?;

    if let Err(e) = bot.delete_message(chat_id, status.id).await {
        log::debug!("Could not delete status message in chat {}: {}", chat_id, e);
    }
    Ok(())
}
