//! YtDlpSource: download backend powered by the yt-dlp CLI.
//!
//! Metadata comes from `--dump-single-json`. Downloads run with `--newline` so
//! every progress update arrives as its own stdout line; stderr is kept as a
//! bounded tail for error classification.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::utils::is_youtube_link;
use crate::download::error::DownloadError;
use crate::download::progress::{parse_progress, DownloadEvent};
use crate::download::resolution::Resolution;
use crate::download::source::{DownloadOutput, DownloadRequest, DownloadSource, MediaMetadata};
use crate::download::ytdlp_errors::analyze_ytdlp_error;

/// Intermediate files that are never the final result
const SKIPPED_EXTENSIONS: &[&str] = &["part", "ytdl", "tmp", "jpg", "jpeg", "png", "webp", "json"];

/// Download source powered by yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpSource {
    bin: String,
    download_timeout: Duration,
    metadata_timeout: Duration,
}

impl YtDlpSource {
    pub fn new(bin: impl Into<String>, download_timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            download_timeout,
            metadata_timeout: config::download::metadata_timeout(),
        }
    }

    pub fn with_metadata_timeout(mut self, metadata_timeout: Duration) -> Self {
        self.metadata_timeout = metadata_timeout;
        self
    }

    fn spawn_error(&self, err: &std::io::Error) -> AppError {
        DownloadError::Spawn {
            bin: self.bin.clone(),
            reason: err.to_string(),
        }
        .into()
    }
}

/// yt-dlp format selector for a maximum height.
///
/// Prefers mp4/m4a so the merge needs no re-encoding, then any codecs at that
/// height, then the best single file.
pub fn format_selector(resolution: Resolution) -> String {
    let h = resolution.height();
    format!(
        "bv*[height<={h}][ext=mp4]+ba[ext=m4a]/bv*[height<={h}]+ba/b[height<={h}]/b",
        h = h
    )
}

/// Command line for a download, without the binary.
pub fn build_download_args(request: &DownloadRequest) -> Vec<String> {
    let template = request.output_dir.join("%(id)s.%(ext)s");
    let mut args = vec![
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "--no-colors".to_string(),
        "-f".to_string(),
        format_selector(request.resolution),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "--write-thumbnail".to_string(),
        "--convert-thumbnails".to_string(),
        "jpg".to_string(),
    ];
    if let Some(cookies) = &request.cookies_file {
        args.push("--cookies".to_string());
        args.push(cookies.to_string_lossy().into_owned());
    }
    args.push(request.url.to_string());
    args
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    id: String,
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
    is_live: Option<bool>,
    live_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    height: Option<u32>,
    vcodec: Option<String>,
}

/// Parses the JSON printed by `yt-dlp --dump-single-json`.
pub fn parse_metadata(json: &[u8]) -> AppResult<MediaMetadata> {
    let raw: RawInfo = serde_json::from_slice(json).map_err(|e| DownloadError::Metadata(e.to_string()))?;

    let mut heights: Vec<Resolution> = raw
        .formats
        .iter()
        .filter(|f| f.vcodec.as_deref() != Some("none"))
        .filter_map(|f| f.height)
        .filter(|h| *h > 0)
        .map(Resolution::new)
        .collect();
    heights.sort_unstable();
    heights.dedup();

    let is_live = raw.is_live.unwrap_or(false)
        || matches!(raw.live_status.as_deref(), Some("is_live" | "is_upcoming" | "post_live"));

    Ok(MediaMetadata {
        title: raw.title.unwrap_or_else(|| raw.id.clone()),
        id: raw.id,
        uploader: raw.uploader,
        duration_secs: raw.duration.filter(|d| *d > 0.0).map(|d| d.round() as u64),
        thumbnail_url: raw.thumbnail,
        available_heights: heights,
        is_live,
    })
}

/// Finds the merged media file yt-dlp left in `dir`.
///
/// Skips partial downloads and thumbnails; prefers `.mp4`, then the largest file.
pub async fn find_downloaded_file(dir: &Path) -> AppResult<(PathBuf, u64)> {
    let mut best: Option<(PathBuf, u64, bool)> = None;

    let mut entries = fs_err::tokio::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if SKIPPED_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let meta = fs_err::tokio::metadata(&path).await?;
        if !meta.is_file() {
            continue;
        }
        let is_mp4 = ext == "mp4";
        let better = match &best {
            None => true,
            Some((_, size, best_mp4)) => (is_mp4, meta.len()) > (*best_mp4, *size),
        };
        if better {
            best = Some((path, meta.len(), is_mp4));
        }
    }

    best.map(|(path, size, _)| (path, size))
        .ok_or_else(|| DownloadError::FileNotFound(dir.display().to_string()).into())
}

/// Finds the converted thumbnail next to the video.
pub async fn find_thumbnail(dir: &Path, video: &Path) -> Option<PathBuf> {
    let candidate = video.with_extension("jpg");
    if fs_err::tokio::metadata(&candidate).await.is_ok() {
        return Some(candidate);
    }

    let mut entries = fs_err::tokio::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "jpg") {
            return Some(path);
        }
    }
    None
}

enum Interrupted {
    Cancelled,
    TimedOut,
}

#[async_trait]
impl DownloadSource for YtDlpSource {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn supports_url(&self, url: &Url) -> bool {
        is_youtube_link(url)
    }

    async fn fetch_metadata(&self, url: &Url, cookies: Option<&Path>) -> AppResult<MediaMetadata> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["--dump-single-json", "--no-playlist", "--skip-download", "--no-warnings"]);
        if let Some(cookies) = cookies {
            cmd.arg("--cookies").arg(cookies);
        }
        cmd.arg(url.as_str()).stdin(Stdio::null()).kill_on_drop(true);

        log::debug!("📋 Fetching metadata: {} {}", self.bin, url);
        let output = timeout(self.metadata_timeout, cmd.output())
            .await
            .map_err(|_| DownloadError::Timeout(self.metadata_timeout.as_secs()))?
            .map_err(|e| self.spawn_error(&e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let kind = analyze_ytdlp_error(&stderr);
            log::warn!("yt-dlp metadata failed for {} ({}): {}", url, kind, stderr.trim());
            return Err(DownloadError::YtDlp { kind, stderr }.into());
        }

        parse_metadata(&output.stdout)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        metadata: &MediaMetadata,
        events: mpsc::UnboundedSender<DownloadEvent>,
        cancel: CancellationToken,
    ) -> AppResult<DownloadOutput> {
        let args = build_download_args(request);
        log::info!("📥 Starting yt-dlp for {} at {}", request.url, request.resolution);
        log::debug!("yt-dlp command: {} {}", self.bin, args.join(" "));

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(&e))?;

        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut tail = VecDeque::with_capacity(config::download::STDERR_TAIL_LINES);
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("yt-dlp stderr: {}", line);
                    if tail.len() == config::download::STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Vec::from(tail).join("\n")
            })
        });

        let deadline = tokio::time::sleep(self.download_timeout);
        tokio::pin!(deadline);

        let mut interrupted = None;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            interrupted = loop {
                tokio::select! {
                    _ = cancel.cancelled() => break Some(Interrupted::Cancelled),
                    _ = &mut deadline => break Some(Interrupted::TimedOut),
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if let Some(progress) = parse_progress(&line) {
                                let _ = events.send(DownloadEvent::Progress(progress));
                            } else {
                                log::trace!("yt-dlp: {}", line);
                            }
                        }
                        Ok(None) => break None,
                        Err(e) => {
                            log::warn!("Failed to read yt-dlp output: {}", e);
                            break None;
                        }
                    },
                }
            };
        }

        let status = match interrupted {
            Some(reason) => Err(reason),
            None => tokio::select! {
                _ = cancel.cancelled() => Err(Interrupted::Cancelled),
                _ = &mut deadline => Err(Interrupted::TimedOut),
                status = child.wait() => Ok(status?),
            },
        };

        let status = match status {
            Ok(status) => status,
            Err(reason) => {
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill yt-dlp: {}", e);
                }
                return Err(match reason {
                    Interrupted::Cancelled => {
                        log::info!("🚫 yt-dlp cancelled for {}", request.url);
                        AppError::Cancelled
                    }
                    Interrupted::TimedOut => {
                        log::error!(
                            "yt-dlp process timed out after {}s, killed",
                            self.download_timeout.as_secs()
                        );
                        DownloadError::Timeout(self.download_timeout.as_secs()).into()
                    }
                });
            }
        };

        let stderr_text = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            let kind = analyze_ytdlp_error(&stderr_text);
            log::error!("❌ yt-dlp exited with {} ({})", status, kind);
            return Err(DownloadError::YtDlp {
                kind,
                stderr: stderr_text,
            }
            .into());
        }

        let (file_path, file_size) = find_downloaded_file(&request.output_dir).await?;
        let thumbnail_path = find_thumbnail(&request.output_dir, &file_path).await;
        log::info!("✅ Downloaded {} ({} bytes)", file_path.display(), file_size);

        Ok(DownloadOutput {
            file_path,
            file_size,
            resolution: request.resolution,
            metadata: metadata.clone(),
            thumbnail_path,
        })
    }
}
