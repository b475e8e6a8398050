//! Command handlers and their texts

use indoc::{formatdoc, indoc};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::Message;

use tubecore::core::config::Settings;
use tubecore::core::rate_limiter::RateLimitStats;
use tubecore::core::utils::{format_eta, truncate_title};
use tubecore::download::job::DownloadJob;
use tubecore::download::queue::QueueStats;

use super::types::{HandlerDeps, HandlerError};

/// Longest title shown in the /status job list
const STATUS_TITLE_CHARS: usize = 40;

pub fn start_text(first_name: Option<&str>) -> String {
    let greeting = match first_name {
        Some(name) => format!("🎬 Welcome {} to the YouTube Downloader Bot!", name),
        None => "🎬 Welcome to the YouTube Downloader Bot!".to_string(),
    };
    formatdoc! {"
        {greeting}

        📥 Features:
        • Download individual YouTube videos
        • Bulk download via .txt file
        • 360p, 480p, 720p or 1080p
        • Live progress while downloading

        👇 Send me:
        • A YouTube link to download a single video
        • A .txt file with one link per line
        • A cookies.txt file to update cookies

        Use /help for more info."
    }
}

pub fn help_text(settings: &Settings) -> String {
    formatdoc! {"
        🤖 YouTube Downloader Bot Help

        📥 Download a single video:
        1. Send any YouTube link
        2. Choose a resolution from the buttons
        3. Wait for download and upload

        📁 Bulk download:
        1. Send a .txt file with one link per line
        2. Choose a resolution for all videos
        3. Videos arrive one by one, in file order

        If a resolution is not available, the closest lower one is used.

        🍪 Cookies:
        Use /update_cookies and send a cookies.txt file. Cookies help with
        age-restricted videos.

        🚫 /cancel stops your queued and running downloads.

        ⚠️ Limits:
        • Max file size: {max_mb} MB
        • Max video length: {max_len}
        • {per_minute} requests per minute, {per_hour} per hour",
        max_mb = settings.max_file_size_mb,
        max_len = format_eta(settings.max_duration_secs),
        per_minute = settings.rate_limit_per_minute,
        per_hour = settings.rate_limit_per_hour,
    }
}

pub fn about_text() -> String {
    formatdoc! {"
        ℹ️ tubebot v{version}

        Downloads YouTube videos with yt-dlp and sends them back to the chat.
        Source links and cookies are only used for downloading.",
        version = env!("CARGO_PKG_VERSION"),
    }
}

pub const UPDATE_COOKIES_TEXT: &str = indoc! {"
    🍪 Update YouTube Cookies

    Please send me a cookies.txt file (Netscape format).
    This helps download age-restricted videos.

    ⚠️ Your cookies are stored only for this chat and only used for downloading."
};

/// Everything the /status reply shows
pub struct StatusInfo {
    pub queue: QueueStats,
    pub chat_jobs: Vec<DownloadJob>,
    pub chat_cookies: bool,
    pub any_cookies: bool,
    pub rate: RateLimitStats,
    pub uptime: Duration,
}

pub fn status_text(info: &StatusInfo) -> String {
    let cookies = match (info.chat_cookies, info.any_cookies) {
        (true, _) => "✅ Configured for this chat",
        (false, true) => "✅ Global cookies",
        (false, false) => "❌ Not configured",
    };

    let mut text = formatdoc! {"
        🤖 Bot Status

        ✅ Operational
        📊 Queue: {running}/{max} running, {queued} waiting
        🏁 Finished: {completed} done, {failed} failed
        🍪 Cookies: {cookies}
        ⏳ Your requests: {minute}/{max_minute} this minute, {hour}/{max_hour} this hour
        ⚡ Version: {version}
        🕒 Uptime: {uptime}",
        running = info.queue.running,
        max = info.queue.max_concurrent,
        queued = info.queue.queued,
        completed = info.queue.completed,
        failed = info.queue.failed,
        minute = info.rate.last_minute,
        max_minute = info.rate.max_per_minute,
        hour = info.rate.last_hour,
        max_hour = info.rate.max_per_hour,
        version = env!("CARGO_PKG_VERSION"),
        uptime = format_eta(info.uptime.as_secs()),
    };

    if !info.chat_jobs.is_empty() {
        text.push_str("\n\n📋 Your jobs:");
        for job in &info.chat_jobs {
            let title = job
                .title
                .as_deref()
                .map(|t| truncate_title(t, STATUS_TITLE_CHARS))
                .unwrap_or_else(|| job.source_url.to_string());
            text.push_str(&format!(
                "\n• {} {} {}% ({})",
                job.id.short(),
                job.status,
                job.progress_percent,
                title
            ));
        }
    }
    text
}

pub async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    let first_name = msg.from.as_ref().map(|u| u.first_name.as_str());
    bot.send_message(msg.chat.id, start_text(first_name)).await?;
    Ok(())
}

pub async fn handle_help_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, help_text(&deps.settings)).await?;
    Ok(())
}

pub async fn handle_about_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, about_text()).await?;
    Ok(())
}

pub async fn handle_update_cookies_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, UPDATE_COOKIES_TEXT).await?;
    Ok(())
}

pub async fn handle_status_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id.0;
    let info = StatusInfo {
        queue: deps.queue.stats(),
        chat_jobs: deps.queue.jobs_for_chat(chat_id),
        chat_cookies: deps.cookies.has_for(chat_id).await,
        any_cookies: deps.cookies.has_any().await,
        rate: deps.rate_limiter.stats(chat_id).await,
        uptime: deps.started_at.elapsed(),
    };
    bot.send_message(msg.chat.id, status_text(&info)).await?;
    Ok(())
}

pub async fn handle_cancel_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let cancelled = deps.queue.cancel_chat(msg.chat.id.0);
    let text = if cancelled.is_empty() {
        "🤷 Nothing to cancel.".to_string()
    } else {
        log::info!("🚫 Chat {} cancelled {} job(s)", msg.chat.id, cancelled.len());
        format!("🚫 Cancelled {} download(s).", cancelled.len())
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
