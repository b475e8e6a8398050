//! Per-chat cookie files for yt-dlp.
//!
//! Layout of the cookie directory:
//! - `cookies_<chat_id>.txt` and `cookies_<chat_id>.backup.txt` per chat
//! - `cookies.txt` shared default
//!
//! The global `YTDL_COOKIES_FILE` is consulted last.

use std::path::{Path, PathBuf};

use crate::core::error::{AppError, AppResult};

/// Lowercased markers that show up in Netscape cookie exports
const COOKIE_INDICATORS: [&str; 6] = ["# http cookie file", "# netscape", "domain", "path", "secure", "expiration"];

#[derive(Debug, Clone)]
pub struct CookieStore {
    dir: PathBuf,
    global: Option<PathBuf>,
}

impl CookieStore {
    pub fn new(dir: impl Into<PathBuf>, global: Option<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            global,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chat_file(&self, chat_id: i64) -> PathBuf {
        self.dir.join(format!("cookies_{}.txt", chat_id))
    }

    fn backup_file(&self, chat_id: i64) -> PathBuf {
        self.dir.join(format!("cookies_{}.backup.txt", chat_id))
    }

    fn default_file(&self) -> PathBuf {
        self.dir.join("cookies.txt")
    }

    /// Validates and stores cookies for a chat, keeping a backup copy.
    pub async fn save_for_chat(&self, chat_id: i64, content: &str) -> AppResult<PathBuf> {
        validate_netscape(content)?;

        fs_err::tokio::create_dir_all(&self.dir).await?;
        let path = self.chat_file(chat_id);
        fs_err::tokio::write(&path, content).await?;
        fs_err::tokio::write(self.backup_file(chat_id), content).await?;

        log::info!("🍪 Cookies updated for chat {} ({} bytes)", chat_id, content.len());
        Ok(path)
    }

    /// Cookie file yt-dlp should use for this chat, if any.
    pub async fn path_for(&self, chat_id: i64) -> Option<PathBuf> {
        let candidates = [Some(self.chat_file(chat_id)), Some(self.default_file()), self.global.clone()];
        for path in candidates.into_iter().flatten() {
            if is_file(&path).await {
                return Some(path);
            }
        }
        None
    }

    /// Whether the chat uploaded its own cookies.
    pub async fn has_for(&self, chat_id: i64) -> bool {
        is_file(&self.chat_file(chat_id)).await
    }

    /// Whether any cookies are configured at all.
    pub async fn has_any(&self) -> bool {
        if is_file(&self.default_file()).await {
            return true;
        }
        if let Some(global) = &self.global {
            if is_file(global).await {
                return true;
            }
        }

        let Ok(mut entries) = fs_err::tokio::read_dir(&self.dir).await else {
            return false;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("cookies_") && name.ends_with(".txt") && !name.ends_with(".backup.txt") {
                return true;
            }
        }
        false
    }
}

async fn is_file(path: &Path) -> bool {
    fs_err::tokio::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

/// Basic sanity check for a Netscape-format cookies file.
///
/// Requires at least two non-empty lines and either a known marker or a
/// tab-separated row with seven fields.
pub fn validate_netscape(content: &str) -> AppResult<()> {
    let lines: Vec<&str> = content.lines().map(str::trim_end).filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Err(AppError::Input(
            "Cookies file is too short. Export it in Netscape format.".to_string(),
        ));
    }

    let has_marker = lines.iter().any(|line| {
        let lower = line.to_lowercase();
        COOKIE_INDICATORS.iter().any(|indicator| lower.contains(indicator))
    });
    let has_row = lines.iter().any(|line| !line.starts_with('#') && line.split('\t').count() == 7);

    if has_marker || has_row {
        Ok(())
    } else {
        Err(AppError::Input(
            "This doesn't look like a Netscape cookies file.".to_string(),
        ))
    }
}
