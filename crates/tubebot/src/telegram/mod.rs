//! Telegram bot integration and handlers

pub mod bot;
pub mod editor;
pub mod handlers;
pub mod preview;
pub mod selection;
pub mod uploader;

pub use teloxide::Bot;

pub use bot::{create_bot, is_message_addressed_to_bot, setup_bot_commands, Command};
pub use editor::TelegramEditor;
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use selection::{PendingSelection, PendingSelections};
pub use uploader::TelegramUploader;
