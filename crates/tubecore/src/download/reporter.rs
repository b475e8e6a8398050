//! Progress message in the chat: one message, edited as the job advances.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::utils::{escape_markdown_v2 as escape_markdown, format_duration, format_eta, format_mb, format_speed};
use crate::download::progress::SourceProgress;
use crate::download::resolution::Resolution;

/// Chat platform operations the reporter needs.
///
/// Texts are MarkdownV2.
#[async_trait]
pub trait MessageEditor: Send + Sync {
    /// Sends a new message and returns its id.
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<i32>;

    /// Replaces the text of an existing message.
    async fn edit(&self, chat_id: i64, message_id: i32, text: &str) -> AppResult<()>;
}

/// Stage of a job as shown to the user
#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    Starting,
    Downloading(SourceProgress),
    Uploading { size_bytes: u64 },
    Success {
        resolution: Resolution,
        duration_secs: Option<u64>,
        elapsed_secs: u64,
    },
    Error { message: String },
    Cancelled,
}

impl ReportStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReportStatus::Success { .. } | ReportStatus::Error { .. } | ReportStatus::Cancelled
        )
    }

    fn phase(&self) -> u8 {
        match self {
            ReportStatus::Starting => 0,
            ReportStatus::Downloading(_) => 1,
            ReportStatus::Uploading { .. } => 2,
            ReportStatus::Success { .. } | ReportStatus::Error { .. } | ReportStatus::Cancelled => 3,
        }
    }

    /// Renders the status as MarkdownV2.
    pub fn to_message(&self, title: &str, note: Option<&str>) -> String {
        let title = escape_markdown(title);
        let mut s = String::with_capacity(title.len() + 200);

        match self {
            ReportStatus::Starting => {
                s.push_str(&format!("🎬 *{}*\n\n⏳ Starting download\\.\\.\\.", title));
            }
            ReportStatus::Downloading(progress) => {
                s.push_str(&format!("🎬 *{}*\n\n📥 Downloading\\.\\.\\.\n", title));
                s.push_str(&format!(
                    "{} {}%",
                    escape_markdown(&create_progress_bar(progress.percent)),
                    progress.percent
                ));
                if let Some(total) = progress.total_bytes {
                    let current = progress.downloaded_bytes.unwrap_or(0);
                    s.push_str(&format!(
                        "\n💾 {}",
                        escape_markdown(&format!("{} / {}", format_mb(current), format_mb(total)))
                    ));
                }
                s.push_str(&format!(
                    "\n⚡ {}",
                    escape_markdown(&format_speed(progress.speed_bps))
                ));
                let eta = match progress.eta_seconds {
                    Some(secs) if secs > 0 => format_eta(secs),
                    _ => "Calculating...".to_string(),
                };
                s.push_str(&format!("\n⏱ ETA: {}", escape_markdown(&eta)));
            }
            ReportStatus::Uploading { size_bytes } => {
                s.push_str(&format!(
                    "🎬 *{}*\n\n📤 Uploading to Telegram\\.\\.\\. {}",
                    title,
                    escape_markdown(&format!("({})", format_mb(*size_bytes)))
                ));
            }
            ReportStatus::Success {
                resolution,
                duration_secs,
                elapsed_secs,
            } => {
                s.push_str(&format!("✅ *{}*\n\n📺 {}", title, resolution));
                if let Some(duration) = duration_secs {
                    s.push_str(&format!(" · 🕒 {}", format_duration(*duration)));
                }
                s.push_str(&format!("\n⏱ Done in {}", format_eta(*elapsed_secs)));
            }
            ReportStatus::Error { message } => {
                s.push_str(&format!("❌ *{}*\n\n{}", title, escape_markdown(message)));
            }
            ReportStatus::Cancelled => {
                s.push_str(&format!("🚫 *{}*\n\nCancelled", title));
            }
        }

        if let Some(note) = note.filter(|n| !n.is_empty()) {
            s.push_str("\n\nℹ️ ");
            s.push_str(&escape_markdown(note));
        }
        s
    }
}

/// Classic `[█████░░░░░]` bar
pub fn create_progress_bar(progress: u8) -> String {
    let width = config::progress::BAR_WIDTH;
    let filled = (usize::from(progress.min(100)) * width) / 100;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

/// Throttled writer of a single progress message.
///
/// Intermediate updates are delivered at most once per `interval` and only
/// when the rendered text changed. Phase changes and terminal updates are
/// always delivered. The displayed percentage never goes down.
pub struct ProgressReporter {
    editor: Arc<dyn MessageEditor>,
    chat_id: i64,
    message_id: Option<i32>,
    interval: Duration,
    title: String,
    note: Option<String>,
    last_edit: Option<Instant>,
    last_text: Option<String>,
    last_phase: Option<u8>,
    last_percent: u8,
}

impl ProgressReporter {
    pub fn new(editor: Arc<dyn MessageEditor>, chat_id: i64, interval: Duration) -> Self {
        Self {
            editor,
            chat_id,
            message_id: None,
            interval,
            title: "Video".to_string(),
            note: None,
            last_edit: None,
            last_text: None,
            last_phase: None,
            last_percent: 0,
        }
    }

    /// Edits an already sent message instead of sending a new one.
    pub fn with_message(mut self, message_id: i32) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn message_id(&self) -> Option<i32> {
        self.message_id
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Extra line shown under the status, e.g. a resolution fallback
    pub fn set_note(&mut self, note: impl Into<String>) {
        self.note = Some(note.into());
    }

    /// Shortcut for a download progress sample.
    pub async fn progress(&mut self, progress: &SourceProgress) -> AppResult<bool> {
        self.update(ReportStatus::Downloading(progress.clone())).await
    }

    /// Shows `status`. Returns whether the message was actually written.
    pub async fn update(&mut self, mut status: ReportStatus) -> AppResult<bool> {
        if let ReportStatus::Downloading(progress) = &mut status {
            progress.percent = progress.percent.max(self.last_percent);
            self.last_percent = progress.percent;
        }

        let phase = status.phase();
        let forced = status.is_terminal() || self.last_phase != Some(phase);
        if !forced {
            if let Some(last) = self.last_edit {
                if last.elapsed() < self.interval {
                    return Ok(false);
                }
            }
        }

        let text = status.to_message(&self.title, self.note.as_deref());
        if self.last_text.as_deref() == Some(text.as_str()) {
            return Ok(false);
        }

        self.deliver(&text).await?;
        self.last_edit = Some(Instant::now());
        self.last_text = Some(text);
        self.last_phase = Some(phase);
        Ok(true)
    }

    async fn deliver(&mut self, text: &str) -> AppResult<()> {
        if let Some(message_id) = self.message_id {
            match self.editor.edit(self.chat_id, message_id, text).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::warn!("Failed to edit progress message: {}. Sending a new one.", e);
                }
            }
        }
        let message_id = self.editor.send(self.chat_id, text).await?;
        self.message_id = Some(message_id);
        Ok(())
    }
}
