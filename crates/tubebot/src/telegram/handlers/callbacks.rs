//! Resolution keyboard presses

use teloxide::prelude::*;

use tubecore::core::error::AppResult;
use tubecore::download::batch::batch_jobs;
use tubecore::download::job::DownloadJob;
use tubecore::download::queue::JobQueue;
use tubecore::download::resolution::Resolution;

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::selection::{parse_callback_data, PendingSelection};

pub const SESSION_EXPIRED_TEXT: &str = "❌ Session expired. Please send the link again.";

/// Queues the jobs of a confirmed selection and returns the reply text.
pub fn enqueue_selection(
    queue: &JobQueue,
    selection: PendingSelection,
    resolution: Resolution,
    requested_by: u64,
) -> AppResult<String> {
    let chat_id = selection.chat_id;

    if !selection.is_batch() {
        let Some(url) = selection.urls.into_iter().next() else {
            return Ok(SESSION_EXPIRED_TEXT.to_string());
        };
        let job = DownloadJob::new(chat_id, url, resolution).with_requested_by(requested_by);
        let id = queue.enqueue(job)?;
        return Ok(match queue.position(id) {
            Some(position) if position > 1 => {
                format!("✅ {} selected. Position in queue: {}", resolution, position)
            }
            _ => format!("✅ {} selected. Starting soon...", resolution),
        });
    }

    let jobs: Vec<DownloadJob> = batch_jobs(chat_id, selection.urls, resolution)?
        .into_iter()
        .map(|job| job.with_requested_by(requested_by))
        .collect();
    let ids = queue.enqueue_all(jobs)?;
    log::info!("📦 Chat {} queued a batch of {} at {}", chat_id, ids.len(), resolution);
    Ok(format!(
        "📦 {} videos queued at {}. They will arrive one by one.",
        ids.len(),
        resolution
    ))
}

pub async fn handle_resolution_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.regular_message() else {
        return Ok(());
    };
    let chat_id = message.chat.id;

    let Some((token, resolution)) = q.data.as_deref().and_then(parse_callback_data) else {
        log::warn!("Unknown callback data from chat {}: {:?}", chat_id, q.data);
        return Ok(());
    };

    let selection = match deps.selections.take(token).await {
        Some(selection) if selection.chat_id == chat_id.0 => selection,
        _ => {
            replace_prompt(bot, message, SESSION_EXPIRED_TEXT).await?;
            return Ok(());
        }
    };

    let reply = match enqueue_selection(&deps.queue, selection, resolution, q.from.id.0) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Could not queue selection for chat {}: {}", chat_id, e);
            e.user_message()
        }
    };
    replace_prompt(bot, message, &reply).await?;
    Ok(())
}

/// Swaps the keyboard message for `text`. Previews with a thumbnail are photos,
/// so their caption is edited instead.
async fn replace_prompt(bot: &Bot, message: &Message, text: &str) -> Result<(), HandlerError> {
    if message.photo().is_some() {
        bot.edit_message_caption(message.chat.id, message.id)
            .caption(text)
            .await?;
    } else {
        bot.edit_message_text(message.chat.id, message.id, text).await?;
    }
    Ok(())
}
