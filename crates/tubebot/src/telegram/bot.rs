//! Bot initialization and message routing utilities
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Message addressing logic (private chats, mentions, replies)

use reqwest::ClientBuilder;
use secrecy::ExposeSecret;
use teloxide::prelude::*;
use teloxide::types::{ChatKind, Message, MessageEntityKind, UserId};
use teloxide::utils::command::BotCommands;

use tubecore::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "how to use the bot")]
    Help,
    #[command(description = "about this bot")]
    About,
    #[command(description = "bot and queue status")]
    Status,
    #[command(description = "upload a cookies.txt file")]
    UpdateCookies,
    #[command(description = "cancel your downloads")]
    Cancel,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Token missing or invalid `BOT_API_URL`
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("BOT_TOKEN environment variable not set"))?;
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    // Local Bot API server lifts the 50 MB upload limit
    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

/// Whether a message should be handled by the bot.
///
/// Private chats always are; in groups only replies to the bot and
/// messages mentioning it.
pub fn is_message_addressed_to_bot(msg: &Message, bot_username: Option<&str>, bot_id: UserId) -> bool {
    if matches!(msg.chat.kind, ChatKind::Private(_)) {
        return true;
    }

    if let Some(from) = msg.reply_to_message().and_then(|reply| reply.from.as_ref()) {
        if from.id == bot_id {
            return true;
        }
    }

    let Some(username) = bot_username else {
        return false;
    };
    let Some(text) = msg.text().or_else(|| msg.caption()) else {
        return false;
    };

    let mentioned = msg.entities().or_else(|| msg.caption_entities()).is_some_and(|entities| {
        entities.iter().any(|entity| {
            matches!(entity.kind, MessageEntityKind::Mention)
                && text
                    .get(entity.offset..entity.offset + entity.length)
                    .map(|mention| mention.trim_start_matches('@'))
                    .is_some_and(|mention| mention.eq_ignore_ascii_case(username))
        })
    });
    mentioned || mentions_username(text, username)
}

fn mentions_username(text: &str, username: &str) -> bool {
    let pattern = format!("@{}", username.to_lowercase());
    text.to_lowercase().contains(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "tubebot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/update_cookies", "tubebot").unwrap(), Command::UpdateCookies);
        assert_eq!(Command::parse("/cancel@tubebot", "tubebot").unwrap(), Command::Cancel);
        assert!(Command::parse("/download", "tubebot").is_err());
    }

    #[test]
    fn test_command_list() {
        let names: Vec<String> = Command::bot_commands()
            .into_iter()
            .map(|c| c.command.trim_start_matches('/').to_string())
            .collect();
        assert_eq!(names, vec!["start", "help", "about", "status", "update_cookies", "cancel"]);
    }

    #[test]
    fn test_mentions_username() {
        assert!(mentions_username("hey @TubeBot grab this", "tubebot"));
        assert!(!mentions_username("hey @otherbot", "tubebot"));
    }
}
