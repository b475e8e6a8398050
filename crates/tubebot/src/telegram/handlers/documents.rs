//! Uploaded files: cookies.txt and batch link lists

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{Document, Message};

use tubecore::core::error::AppError;
use tubecore::download::batch::BatchExpander;

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::selection::{resolution_keyboard, PendingSelection};

/// Largest text file the bot accepts
const MAX_TEXT_FILE_BYTES: u32 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Cookies,
    BatchList,
    Unsupported,
}

/// Tells cookie files from batch lists by file name.
pub fn classify_document(file_name: Option<&str>) -> DocumentKind {
    let Some(name) = file_name.map(str::to_lowercase) else {
        return DocumentKind::Unsupported;
    };
    if name == "cookies.txt" {
        DocumentKind::Cookies
    } else if name.ends_with(".txt") {
        DocumentKind::BatchList
    } else {
        DocumentKind::Unsupported
    }
}

pub async fn handle_document(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    let kind = classify_document(doc.file_name.as_deref());
    log::info!("📎 Chat {} uploaded {:?} ({:?})", chat_id, doc.file_name, kind);

    if kind == DocumentKind::Unsupported {
        bot.send_message(chat_id, "❌ Please send a .txt file: a list of links, or cookies.txt")
            .await?;
        return Ok(());
    }
    if doc.file.size > MAX_TEXT_FILE_BYTES {
        bot.send_message(chat_id, "❌ The file is too large. Text files up to 1 MB are accepted.")
            .await?;
        return Ok(());
    }

    match kind {
        DocumentKind::Cookies => handle_cookies_file(bot, msg, doc, deps).await,
        _ => handle_batch_file(bot, msg, doc, deps).await,
    }
}

async fn handle_cookies_file(bot: &Bot, msg: &Message, doc: &Document, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let content = download_text(bot, doc).await?;

    let reply = match deps.cookies.save_for_chat(chat_id.0, &content).await {
        Ok(path) => {
            log::info!("🍪 Cookies updated for chat {}: {}", chat_id, path.display());
            "✅ Cookies updated successfully! They will be used for your next downloads.".to_string()
        }
        Err(e) => {
            log::warn!("Rejected cookies file from chat {}: {}", chat_id, e);
            e.user_message()
        }
    };
    bot.send_message(chat_id, reply).await?;
    Ok(())
}

async fn handle_batch_file(bot: &Bot, msg: &Message, doc: &Document, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;

    if let Err(e) = deps.rate_limiter.check(chat_id.0).await {
        bot.send_message(chat_id, e.user_message()).await?;
        return Ok(());
    }

    let content = match download_text(bot, doc).await {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Could not read batch file from chat {}: {}", chat_id, e);
            bot.send_message(chat_id, "❌ Could not read the file. Is it plain UTF-8 text?")
                .await?;
            return Ok(());
        }
    };

    let expander = BatchExpander::from_text(content);
    let summary = expander.summary();
    log::info!(
        "📁 Batch file from chat {}: {} valid, {} invalid, {} blank",
        chat_id,
        summary.valid,
        summary.invalid,
        summary.blank
    );

    let urls: Vec<_> = expander.iter().map(|line| line.url).collect();
    if urls.is_empty() {
        bot.send_message(chat_id, "❌ No valid URLs found in file").await?;
        return Ok(());
    }

    let selection = PendingSelection::from_file(chat_id.0, urls, summary.invalid);
    let prompt = selection.prompt();
    let token = deps.selections.insert(selection).await;
    bot.send_message(chat_id, prompt)
        .reply_markup(resolution_keyboard(&token, deps.settings.default_resolution))
        .await?;
    Ok(())
}

/// Fetches an uploaded document as UTF-8 text.
async fn download_text(bot: &Bot, doc: &Document) -> Result<String, HandlerError> {
    let file = bot.get_file(doc.file.id.clone()).await?;
    let mut bytes: Vec<u8> = Vec::with_capacity(file.size as usize);
    bot.download_file(&file.path, &mut bytes).await?;
    String::from_utf8(bytes).map_err(|_| AppError::Input("The file is not valid UTF-8 text.".to_string()).into())
}
