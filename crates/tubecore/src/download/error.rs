use thiserror::Error;

use crate::download::ytdlp_errors::{get_error_message, YtDlpErrorType};

/// Structured error type for download operations.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// yt-dlp exited with an error; `kind` is derived from its stderr
    #[error("yt-dlp failed ({kind}): {}", last_line(.stderr))]
    YtDlp { kind: YtDlpErrorType, stderr: String },
    /// yt-dlp could not be started at all
    #[error("failed to start {bin}: {reason}")]
    Spawn { bin: String, reason: String },
    /// Download or metadata request timed out
    #[error("timed out after {0}s")]
    Timeout(u64),
    /// yt-dlp produced output we could not understand
    #[error("unreadable metadata: {0}")]
    Metadata(String),
    /// Expected file not found after download
    #[error("downloaded file not found in {0}")]
    FileNotFound(String),
    /// Live streams cannot be downloaded
    #[error("live streams are not supported")]
    Livestream,
    /// Video exceeds the configured maximum duration
    #[error("video is {duration}s long, limit is {limit}s")]
    TooLong { duration: u64, limit: u64 },
}

fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("no output")
}

impl DownloadError {
    /// Returns subcategory for logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::YtDlp { .. } => "ytdlp",
            DownloadError::Spawn { .. } => "spawn",
            DownloadError::Timeout(_) => "timeout",
            DownloadError::Metadata(_) => "metadata",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Livestream => "livestream",
            DownloadError::TooLong { .. } => "too_long",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::YtDlp { kind, .. } => *kind != YtDlpErrorType::VideoUnavailable,
            DownloadError::Timeout(_) | DownloadError::FileNotFound(_) | DownloadError::Metadata(_) => true,
            DownloadError::Spawn { .. } | DownloadError::Livestream | DownloadError::TooLong { .. } => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            DownloadError::YtDlp { kind, .. } => get_error_message(kind).to_string(),
            DownloadError::Timeout(secs) => format!("❌ Download took longer than {} minutes.", secs / 60),
            DownloadError::Livestream => "❌ Live streams can't be downloaded.".to_string(),
            DownloadError::TooLong { limit, .. } => {
                format!("❌ Video is too long. Limit is {} minutes.", limit / 60)
            }
            _ => get_error_message(&YtDlpErrorType::Unknown).to_string(),
        }
    }
}

/// Errors raised while sending the result back to the chat.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// File is bigger than the platform accepts
    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    /// Upload did not finish in time
    #[error("upload timed out after {0}s")]
    Timeout(u64),
    /// Platform refused the file
    #[error("rejected by Telegram: {0}")]
    Rejected(String),
}

impl UploadError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UploadError::TooLarge { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            UploadError::TooLarge { size, limit } => format!(
                "❌ File is too large for Telegram ({:.1} MB, limit {:.0} MB).",
                *size as f64 / (1024.0 * 1024.0),
                *limit as f64 / (1024.0 * 1024.0)
            ),
            UploadError::Timeout(_) => "❌ Upload to Telegram timed out.".to_string(),
            UploadError::Rejected(_) => "❌ Telegram rejected the file.".to_string(),
        }
    }
}
