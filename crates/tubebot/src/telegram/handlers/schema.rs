//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::callbacks::handle_resolution_callback;
use super::commands::{
    handle_about_command, handle_cancel_command, handle_help_command, handle_start_command, handle_status_command,
    handle_update_cookies_command,
};
use super::documents::handle_document;
use super::links::handle_link_message;
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::{is_message_addressed_to_bot, Command};

/// Creates the dispatcher schema of the bot.
///
/// Order matters: commands first, then uploaded files, then plain text
/// with links, then keyboard callbacks.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(command_handler(deps.clone()))
        .branch(document_handler(deps.clone()))
        .branch(message_handler(deps.clone()))
        .branch(callback_handler(deps))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start => handle_start_command(&bot, &msg).await?,
                    Command::Help => handle_help_command(&bot, &msg, &deps).await?,
                    Command::About => handle_about_command(&bot, &msg).await?,
                    Command::Status => handle_status_command(&bot, &msg, &deps).await?,
                    Command::UpdateCookies => handle_update_cookies_command(&bot, &msg).await?,
                    Command::Cancel => handle_cancel_command(&bot, &msg, &deps).await?,
                }
                Ok(())
            }
        },
    ))
}

fn document_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let bot_username = deps.bot_username.clone();
    let bot_id = deps.bot_id;

    Update::filter_message()
        .filter(move |msg: Message| {
            msg.document().is_some() && is_message_addressed_to_bot(&msg, bot_username.as_deref(), bot_id)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_document(&bot, &msg, &deps).await {
                    log::error!("❌ Document handler failed for chat {}: {}", msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, "❌ Error processing the file. Please try again.")
                        .await;
                }
                Ok(())
            }
        })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let bot_username = deps.bot_username.clone();
    let bot_id = deps.bot_id;

    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .filter(move |msg: Message| is_message_addressed_to_bot(&msg, bot_username.as_deref(), bot_id))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_link_message(&bot, &msg, &deps).await {
                    log::error!("❌ Message handler failed for chat {}: {}", msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, "❌ An error occurred. Please try again.")
                        .await;
                }
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = handle_resolution_callback(&bot, &q, &deps).await {
                log::error!("❌ Callback handler failed for user {}: {}", q.from.id, e);
            }
            Ok(())
        }
    })
}
