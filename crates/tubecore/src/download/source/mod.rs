//! Download backends.
//!
//! The `DownloadSource` trait is the seam between the job runner and the
//! external downloader. `YtDlpSource` is the production backend; tests plug
//! in their own implementations.

pub mod ytdlp;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::error::AppResult;
use crate::download::progress::DownloadEvent;
use crate::download::resolution::Resolution;

pub use ytdlp::YtDlpSource;

/// What the source knows about a video before downloading it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaMetadata {
    pub id: String,
    pub title: String,
    pub uploader: Option<String>,
    pub duration_secs: Option<u64>,
    pub thumbnail_url: Option<String>,
    /// Heights offered by the site, ascending, no duplicates
    pub available_heights: Vec<Resolution>,
    pub is_live: bool,
}

/// Parameters of one download.
#[derive(Debug, Clone, bon::Builder)]
pub struct DownloadRequest {
    pub url: Url,
    /// Resolution to fetch, already resolved against the available heights
    pub resolution: Resolution,
    /// Job scratch directory; the source writes only here
    #[builder(into)]
    pub output_dir: PathBuf,
    #[builder(into)]
    pub cookies_file: Option<PathBuf>,
}

/// Result of a successful download.
#[derive(Debug, Clone)]
pub struct DownloadOutput {
    pub file_path: PathBuf,
    pub file_size: u64,
    pub resolution: Resolution,
    pub metadata: MediaMetadata,
    /// Thumbnail written next to the video, if any
    pub thumbnail_path: Option<PathBuf>,
}

/// A backend that turns a URL into a local media file.
#[async_trait]
pub trait DownloadSource: Send + Sync {
    /// Human-readable name of this source (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Whether this source can handle the given URL.
    fn supports_url(&self, url: &Url) -> bool;

    /// Fetches title, duration and the list of available heights.
    async fn fetch_metadata(&self, url: &Url, cookies: Option<&Path>) -> AppResult<MediaMetadata>;

    /// Downloads the request into `request.output_dir`, reporting through `events`.
    ///
    /// Must stop promptly and return `AppError::Cancelled` once `cancel` fires.
    async fn download(
        &self,
        request: &DownloadRequest,
        metadata: &MediaMetadata,
        events: mpsc::UnboundedSender<DownloadEvent>,
        cancel: CancellationToken,
    ) -> AppResult<DownloadOutput>;
}
