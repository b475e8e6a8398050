use thiserror::Error;

use crate::download::error::{DownloadError, UploadError};
use crate::download::job::JobStatus;
use crate::download::resolution::Resolution;

/// Centralized error type of the library.
///
/// The first five variants are the user-facing taxonomy: bad input, download
/// failures, missing resolutions, quota limits and upload rejections. The rest
/// wrap infrastructure errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed URL, batch file or cookies file
    #[error("Input error: {0}")]
    Input(String),

    /// Network or yt-dlp failure
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Requested resolution does not exist and the policy allows no fallback
    #[error("Resolution {requested} unavailable (available: {})", format_heights(.available))]
    ResolutionUnavailable {
        requested: Resolution,
        available: Vec<Resolution>,
    },

    /// Concurrency, queue size or rate limits
    #[error("Quota exceeded: {0}")]
    Quota(String),

    /// Telegram rejected the file
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Job was cancelled by the user
    #[error("Cancelled")]
    Cancelled,

    /// Attempt to move a job backwards or out of a terminal state
    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// Settings validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Telegram API errors
    #[cfg(feature = "telegram")]
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

fn format_heights(heights: &[Resolution]) -> String {
    if heights.is_empty() {
        return "none".to_string();
    }
    itertools::join(heights.iter(), ", ")
}

impl AppError {
    /// Whether the job runner should try the failed step once more.
    ///
    /// Only download and upload failures qualify, and not the deterministic ones.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Download(e) => e.is_retryable(),
            AppError::Upload(e) => e.is_retryable(),
            AppError::Io(_) => true,
            #[cfg(feature = "telegram")]
            AppError::Telegram(e) => matches!(
                e,
                teloxide::RequestError::Network(_) | teloxide::RequestError::RetryAfter(_) | teloxide::RequestError::Io(_)
            ),
            _ => false,
        }
    }

    /// Metrics/log label of the error class
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Input(_) | AppError::Url(_) => "input",
            AppError::Download(_) => "download",
            AppError::ResolutionUnavailable { .. } => "resolution",
            AppError::Quota(_) => "quota",
            AppError::Upload(_) => "upload",
            AppError::Cancelled => "cancelled",
            AppError::InvalidTransition { .. } => "state",
            AppError::Validation(_) | AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            #[cfg(feature = "telegram")]
            AppError::Telegram(_) => "telegram",
            AppError::Anyhow(_) => "other",
        }
    }

    /// Short text safe to show in a chat
    pub fn user_message(&self) -> String {
        match self {
            AppError::Input(msg) => format!("❌ {}", msg),
            AppError::Url(_) => "❌ That doesn't look like a valid link.".to_string(),
            AppError::Download(e) => e.user_message(),
            AppError::ResolutionUnavailable { requested, available } => format!(
                "❌ {} is not available for this video. Available: {}",
                requested,
                format_heights(available)
            ),
            AppError::Quota(msg) => format!("⏳ {}", msg),
            AppError::Upload(e) => e.user_message(),
            AppError::Cancelled => "🚫 Cancelled".to_string(),
            _ => "❌ Something went wrong. Please try again later.".to_string(),
        }
    }
}
