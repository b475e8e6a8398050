//! Scriptable download source

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use tubecore::core::error::{AppError, AppResult};
use tubecore::core::utils::is_youtube_link;
use tubecore::download::error::DownloadError;
use tubecore::download::progress::{DownloadEvent, SourceProgress};
use tubecore::download::resolution::Resolution;
use tubecore::download::source::{DownloadOutput, DownloadRequest, DownloadSource, MediaMetadata};

/// One recorded download call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDownload {
    pub url: Url,
    pub resolution: Resolution,
    pub output_dir: PathBuf,
    pub cookies_file: Option<PathBuf>,
}

pub struct MockSource {
    pub heights: Vec<Resolution>,
    pub duration_secs: Option<u64>,
    pub is_live: bool,
    /// How long each download takes
    pub delay: Duration,
    /// Block until the job is cancelled
    pub hang_until_cancelled: bool,
    pub file_size: usize,
    /// Errors returned by the next download attempts, front first
    pub failures: Mutex<VecDeque<DownloadError>>,
    pub metadata_calls: AtomicUsize,
    pub attempts: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub downloads: Mutex<Vec<RecordedDownload>>,
}

impl Default for MockSource {
    fn default() -> Self {
        Self {
            heights: vec![Resolution::P360, Resolution::P480, Resolution::P720, Resolution::P1080],
            duration_secs: Some(212),
            is_live: false,
            delay: Duration::ZERO,
            hang_until_cancelled: false,
            file_size: 1024,
            failures: Mutex::new(VecDeque::new()),
            metadata_calls: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            downloads: Mutex::new(Vec::new()),
        }
    }
}

impl MockSource {
    pub fn with_heights(heights: &[u32]) -> Self {
        Self {
            heights: heights.iter().copied().map(Resolution::new).collect(),
            ..Self::default()
        }
    }

    pub fn fail_next(self, error: DownloadError) -> Self {
        self.failures.lock().unwrap().push_back(error);
        self
    }

    pub fn downloads(&self) -> Vec<RecordedDownload> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn metadata(&self, url: &Url) -> MediaMetadata {
        MediaMetadata {
            id: url.path().trim_start_matches('/').to_string(),
            title: format!("Video {}", url.path().trim_start_matches('/')),
            uploader: Some("Mock Channel".to_string()),
            duration_secs: self.duration_secs,
            thumbnail_url: None,
            available_heights: self.heights.clone(),
            is_live: self.is_live,
        }
    }

    async fn work(
        &self,
        request: &DownloadRequest,
        metadata: &MediaMetadata,
        events: &mpsc::UnboundedSender<DownloadEvent>,
        cancel: &CancellationToken,
    ) -> AppResult<DownloadOutput> {
        for percent in [0u8, 50] {
            let _ = events.send(DownloadEvent::Progress(SourceProgress {
                percent,
                speed_bps: Some(1024.0 * 1024.0),
                eta_seconds: Some(1),
                downloaded_bytes: None,
                total_bytes: Some(self.file_size as u64),
            }));
        }

        if self.hang_until_cancelled {
            cancel.cancelled().await;
            return Err(AppError::Cancelled);
        }
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        let failure = self.failures.lock().unwrap().pop_front();
        if let Some(error) = failure {
            return Err(error.into());
        }

        let file_path = request.output_dir.join(format!("{}.mp4", metadata.id));
        let thumbnail_path = request.output_dir.join(format!("{}.jpg", metadata.id));
        write_file(&file_path, self.file_size).await?;
        write_file(&thumbnail_path, 16).await?;

        let _ = events.send(DownloadEvent::Progress(SourceProgress {
            percent: 100,
            ..SourceProgress::default()
        }));

        Ok(DownloadOutput {
            file_path,
            file_size: self.file_size as u64,
            resolution: request.resolution,
            metadata: metadata.clone(),
            thumbnail_path: Some(thumbnail_path),
        })
    }
}

async fn write_file(path: &Path, size: usize) -> AppResult<()> {
    tokio::fs::write(path, vec![0u8; size]).await?;
    Ok(())
}

#[async_trait]
impl DownloadSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_url(&self, url: &Url) -> bool {
        is_youtube_link(url)
    }

    async fn fetch_metadata(&self, url: &Url, _cookies: Option<&Path>) -> AppResult<MediaMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata(url))
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        metadata: &MediaMetadata,
        events: mpsc::UnboundedSender<DownloadEvent>,
        cancel: CancellationToken,
    ) -> AppResult<DownloadOutput> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.downloads.lock().unwrap().push(RecordedDownload {
            url: request.url.clone(),
            resolution: request.resolution,
            output_dir: request.output_dir.clone(),
            cookies_file: request.cookies_file.clone(),
        });

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let result = self.work(request, metadata, &events, &cancel).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
