use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use once_cell::sync::Lazy;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::AppResult;
use crate::download::resolution::{Resolution, ResolutionPolicy};

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<Option<SecretString>> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .ok()
        .filter(|token| !token.trim().is_empty())
        .map(SecretString::from)
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable, no file logging when unset
pub static LOG_FILE_PATH: Lazy<Option<String>> = Lazy::new(|| env::var("LOG_FILE_PATH").ok());

/// Optional TOML file with settings overrides
/// Read from TUBEBOT_CONFIG, default: tubebot.toml
pub static CONFIG_FILE: Lazy<String> =
    Lazy::new(|| env::var("TUBEBOT_CONFIG").unwrap_or_else(|_| "tubebot.toml".to_string()));

/// Queue processing configuration
pub mod queue {
    /// Maximum number of concurrent downloads across all chats
    /// Kept at 2 to avoid YouTube 403 rate limiting
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 2;

    /// Maximum number of concurrent downloads within one chat
    pub const MAX_PER_CHAT: usize = 1;

    /// Maximum number of waiting jobs
    pub const MAX_QUEUE_SIZE: usize = 1000;

    /// Delay before each non-first item of a batch (milliseconds)
    pub const BATCH_ITEM_DELAY_MS: u64 = 2000;
}

/// Download configuration
pub mod download {
    use super::Duration;

    /// Timeout for a full yt-dlp download (in seconds)
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 1800;

    /// Timeout for yt-dlp metadata requests (in seconds)
    pub const METADATA_TIMEOUT_SECS: u64 = 120;

    /// Longest video accepted for download (in seconds)
    pub const MAX_DURATION_SECS: u64 = 7200;

    /// Delay before retrying a failed download or upload
    pub const RETRY_DELAY_SECS: u64 = 5;

    /// Number of stderr lines kept for error classification
    pub const STDERR_TAIL_LINES: usize = 200;

    pub fn metadata_timeout() -> Duration {
        Duration::from_secs(METADATA_TIMEOUT_SECS)
    }

    pub fn retry_delay() -> Duration {
        Duration::from_secs(RETRY_DELAY_SECS)
    }
}

/// Upload configuration
pub mod upload {
    /// Telegram upload limit (local Bot API server)
    pub const MAX_FILE_SIZE_MB: u64 = 2000;

    /// Timeout for a single upload (in seconds)
    pub const UPLOAD_TIMEOUT_SECS: u64 = 600;
}

/// Progress message configuration
pub mod progress {
    /// Minimum interval between edits of the progress message (milliseconds)
    pub const EDIT_INTERVAL_MS: u64 = 3000;

    /// Progress bar width in cells
    pub const BAR_WIDTH: usize = 10;
}

/// Rate limiting configuration
pub mod rate_limit {
    use super::Duration;

    /// Requests allowed per chat within one minute
    pub const PER_MINUTE: usize = 10;

    /// Requests allowed per chat within one hour
    pub const PER_HOUR: usize = 50;

    pub fn minute_window() -> Duration {
        Duration::from_secs(60)
    }

    pub fn hour_window() -> Duration {
        Duration::from_secs(3600)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Timeout for Bot API requests (seconds). Uploads of large videos take a while.
    pub const TIMEOUT_SECS: u64 = 900;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Runtime settings of the bot.
///
/// Loaded once at startup and passed down explicitly. Sources, later ones win:
/// built-in defaults, `tubebot.toml`, well-known deployment variables
/// (`PORT`, `YTDL_BIN`, `YTDL_COOKIES_FILE`, `TEMP_FILES_DIR`, `COOKIES_DIR`)
/// and finally `TUBEBOT_*` variables (e.g. `TUBEBOT_MAX_CONCURRENT_DOWNLOADS=4`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// yt-dlp binary
    pub ytdl_bin: String,
    /// Global cookies file used when a chat has none of its own
    pub ytdl_cookies_file: Option<PathBuf>,
    /// Directory with per-chat cookie files
    pub cookies_dir: PathBuf,
    /// Scratch directory; every job gets its own subdirectory
    pub temp_files_dir: PathBuf,
    /// Port of the health-check HTTP server
    pub port: u16,
    pub max_concurrent_downloads: usize,
    pub max_per_chat: usize,
    pub max_queue_size: usize,
    pub download_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub max_file_size_mb: u64,
    pub max_duration_secs: u64,
    pub progress_interval_ms: u64,
    pub batch_item_delay_ms: u64,
    pub rate_limit_per_minute: usize,
    pub rate_limit_per_hour: usize,
    /// Resolution used when a request does not name one
    pub default_resolution: Resolution,
    /// What to do when the requested resolution does not exist
    pub resolution_policy: ResolutionPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ytdl_bin: "yt-dlp".to_string(),
            ytdl_cookies_file: None,
            cookies_dir: PathBuf::from("cookies"),
            temp_files_dir: env::temp_dir().join("tubebot"),
            port: 8080,
            max_concurrent_downloads: queue::MAX_CONCURRENT_DOWNLOADS,
            max_per_chat: queue::MAX_PER_CHAT,
            max_queue_size: queue::MAX_QUEUE_SIZE,
            download_timeout_secs: download::DOWNLOAD_TIMEOUT_SECS,
            upload_timeout_secs: upload::UPLOAD_TIMEOUT_SECS,
            max_file_size_mb: upload::MAX_FILE_SIZE_MB,
            max_duration_secs: download::MAX_DURATION_SECS,
            progress_interval_ms: progress::EDIT_INTERVAL_MS,
            batch_item_delay_ms: queue::BATCH_ITEM_DELAY_MS,
            rate_limit_per_minute: rate_limit::PER_MINUTE,
            rate_limit_per_hour: rate_limit::PER_HOUR,
            default_resolution: Resolution::P720,
            resolution_policy: ResolutionPolicy::default(),
        }
    }
}

impl Settings {
    /// Builds the layered figment without extracting it.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(CONFIG_FILE.as_str()))
            .merge(Env::raw().only(&[
                "PORT",
                "YTDL_BIN",
                "YTDL_COOKIES_FILE",
                "TEMP_FILES_DIR",
                "COOKIES_DIR",
            ]))
            .merge(Env::prefixed("TUBEBOT_"))
    }

    /// Loads settings from all sources.
    pub fn load() -> AppResult<Self> {
        let settings: Settings = Self::figment().extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> AppResult<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(crate::core::error::AppError::Validation(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        if self.max_per_chat == 0 {
            return Err(crate::core::error::AppError::Validation(
                "max_per_chat must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn batch_item_delay(&self) -> Duration {
        Duration::from_millis(self.batch_item_delay_ms)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}
