//! Stand-ins for yt-dlp and Telegram

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use tubecore::core::error::{AppError, AppResult};
use tubecore::download::error::DownloadError;
use tubecore::download::pipeline::{MediaUploader, UploadRequest};
use tubecore::download::progress::DownloadEvent;
use tubecore::download::reporter::MessageEditor;
use tubecore::download::resolution::Resolution;
use tubecore::download::source::{DownloadOutput, DownloadRequest, DownloadSource, MediaMetadata};
use tubecore::download::ytdlp_errors::YtDlpErrorType;

/// Finishes every download instantly; paths containing "private" fail and
/// paths containing "slow" block until the job is cancelled.
#[derive(Default)]
pub struct InstantSource;

#[async_trait]
impl DownloadSource for InstantSource {
    fn name(&self) -> &str {
        "instant"
    }

    fn supports_url(&self, _url: &Url) -> bool {
        true
    }

    async fn fetch_metadata(&self, url: &Url, _cookies: Option<&Path>) -> AppResult<MediaMetadata> {
        Ok(MediaMetadata {
            id: url.path().trim_start_matches('/').to_string(),
            title: format!("Video {}", url.path()),
            duration_secs: Some(60),
            available_heights: Resolution::CHOICES.to_vec(),
            ..MediaMetadata::default()
        })
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        metadata: &MediaMetadata,
        _events: mpsc::UnboundedSender<DownloadEvent>,
        cancel: CancellationToken,
    ) -> AppResult<DownloadOutput> {
        if request.url.path().contains("slow") {
            cancel.cancelled().await;
            return Err(AppError::Cancelled);
        }
        if request.url.path().contains("private") {
            return Err(DownloadError::YtDlp {
                kind: YtDlpErrorType::VideoUnavailable,
                stderr: "ERROR: Private video".to_string(),
            }
            .into());
        }

        let file_path = request.output_dir.join(format!("{}.mp4", metadata.id));
        tokio::fs::write(&file_path, b"video").await?;
        Ok(DownloadOutput {
            file_path,
            file_size: 5,
            resolution: request.resolution,
            metadata: metadata.clone(),
            thumbnail_path: None,
        })
    }
}

#[derive(Default)]
pub struct RecordingEditor {
    next_id: AtomicI32,
    pub sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingEditor {
    pub fn sent_texts(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl MessageEditor for RecordingEditor {
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<i32> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn edit(&self, _chat_id: i64, _message_id: i32, _text: &str) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct NullUploader {
    pub uploads: Mutex<Vec<UploadRequest>>,
}

#[async_trait]
impl MediaUploader for NullUploader {
    async fn upload_video(&self, request: &UploadRequest) -> AppResult<()> {
        self.uploads.lock().unwrap().push(request.clone());
        Ok(())
    }
}
