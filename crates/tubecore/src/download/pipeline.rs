//! Drives one job from download to delivery.

use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::core::config::{self, Settings};
use crate::core::error::{AppError, AppResult};
use crate::core::utils::{escape_markdown_v2, format_duration};
use crate::download::cookies::CookieStore;
use crate::download::downloader::Downloader;
use crate::download::error::UploadError;
use crate::download::job::{DownloadJob, JobStatus};
use crate::download::progress::DownloadEvent;
use crate::download::queue::{ActiveJob, CANCELLED_REASON};
use crate::download::reporter::{MessageEditor, ProgressReporter, ReportStatus};
use crate::download::resolution::Resolution;
use crate::download::source::{DownloadOutput, DownloadRequest};

/// Everything the uploader needs to send one video
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub chat_id: i64,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub title: String,
    /// MarkdownV2 caption
    pub caption: String,
    pub duration_secs: Option<u64>,
    pub resolution: Resolution,
    pub thumbnail_path: Option<PathBuf>,
}

/// Sends finished files back to the chat.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload_video(&self, request: &UploadRequest) -> AppResult<()>;
}

/// Tunables of the job runner
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub temp_dir: PathBuf,
    pub progress_interval: Duration,
    pub batch_item_delay: Duration,
    pub retry_delay: Duration,
    pub upload_timeout: Duration,
    pub max_file_size: u64,
}

impl From<&Settings> for RunnerOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            temp_dir: settings.temp_files_dir.clone(),
            progress_interval: settings.progress_interval(),
            batch_item_delay: settings.batch_item_delay(),
            retry_delay: config::download::retry_delay(),
            upload_timeout: settings.upload_timeout(),
            max_file_size: settings.max_file_size_bytes(),
        }
    }
}

/// What was delivered
struct Delivered {
    resolution: Resolution,
    duration_secs: Option<u64>,
}

/// Builds the MarkdownV2 caption of an uploaded video.
pub fn build_caption(title: &str, resolution: Resolution, duration_secs: Option<u64>) -> String {
    let mut caption = format!("🎬 *{}*\n📺 {}", escape_markdown_v2(title), resolution);
    if let Some(duration) = duration_secs {
        caption.push_str(&format!(" · 🕒 {}", format_duration(duration)));
    }
    caption
}

/// Runs jobs handed out by the queue.
///
/// Download and upload are each retried once on retryable errors. Every job
/// works in its own scratch directory, removed when the job ends.
pub struct JobRunner {
    downloader: Downloader,
    uploader: Arc<dyn MediaUploader>,
    editor: Arc<dyn MessageEditor>,
    cookies: CookieStore,
    options: RunnerOptions,
}

impl JobRunner {
    pub fn new(
        downloader: Downloader,
        uploader: Arc<dyn MediaUploader>,
        editor: Arc<dyn MessageEditor>,
        cookies: CookieStore,
        options: RunnerOptions,
    ) -> Self {
        Self {
            downloader,
            uploader,
            editor,
            cookies,
            options,
        }
    }

    /// Runs the job to completion and returns its final state.
    pub async fn run(&self, active: ActiveJob) -> Option<DownloadJob> {
        let Some(job) = active.snapshot() else {
            return active.finish(Err("job disappeared from the queue".to_string()));
        };
        let started = Instant::now();
        let cancel = active.cancel_token();
        let mut reporter = ProgressReporter::new(Arc::clone(&self.editor), job.chat_id, self.options.progress_interval);
        if let Some(batch) = job.batch {
            reporter.set_title(format!("Video {}/{}", batch.index + 1, batch.total));
        }

        if let Some(batch) = job.batch.filter(|b| !b.is_first()) {
            if !self.options.batch_item_delay.is_zero() {
                log::debug!("Batch {} item {}: waiting before start", batch.batch_id, batch.index);
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.options.batch_item_delay) => {}
                }
            }
        }

        let result = if cancel.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            if let Err(e) = reporter.update(ReportStatus::Starting).await {
                log::warn!("Failed to send progress message for job {}: {}", job.id.short(), e);
            }
            self.execute(&active, &job, &mut reporter).await
        };

        // A cancel that lands after the upload still wins: the queue already
        // recorded the job as cancelled
        let (status, outcome) = match result {
            _ if active.is_cancelled() => (ReportStatus::Cancelled, Err(CANCELLED_REASON.to_string())),
            Ok(delivered) => {
                log::info!(
                    "✅ Job {} delivered to chat {} at {}",
                    job.id.short(),
                    job.chat_id,
                    delivered.resolution
                );
                (
                    ReportStatus::Success {
                        resolution: delivered.resolution,
                        duration_secs: delivered.duration_secs,
                        elapsed_secs: started.elapsed().as_secs(),
                    },
                    Ok(()),
                )
            }
            Err(e) => {
                log::error!("❌ Job {} failed [{}]: {}", job.id.short(), e.category(), e);
                (
                    ReportStatus::Error {
                        message: e.user_message(),
                    },
                    Err(e.to_string()),
                )
            }
        };

        if let Err(e) = reporter.update(status).await {
            log::warn!("Failed to send final status for job {}: {}", job.id.short(), e);
        }
        active.finish(outcome)
    }

    async fn execute(
        &self,
        active: &ActiveJob,
        job: &DownloadJob,
        reporter: &mut ProgressReporter,
    ) -> AppResult<Delivered> {
        fs_err::tokio::create_dir_all(&self.options.temp_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("job-")
            .tempdir_in(&self.options.temp_dir)?;
        log::debug!("Job {} scratch dir: {}", job.id.short(), scratch.path().display());

        let result = self.download_and_upload(active, job, reporter, scratch.path()).await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            log::warn!("Failed to remove {}: {}", scratch_path.display(), e);
        }
        result
    }

    async fn download_and_upload(
        &self,
        active: &ActiveJob,
        job: &DownloadJob,
        reporter: &mut ProgressReporter,
        scratch: &Path,
    ) -> AppResult<Delivered> {
        let cancel = active.cancel_token();
        let cookies = self.cookies.path_for(job.chat_id).await;
        let request = DownloadRequest::builder()
            .url(job.source_url.clone())
            .resolution(job.requested_resolution)
            .output_dir(scratch)
            .maybe_cookies_file(cookies)
            .build();

        let output = self.download(active, job, reporter, &request).await?;
        active.set_selected_resolution(output.resolution);

        if output.file_size > self.options.max_file_size {
            return Err(UploadError::TooLarge {
                size: output.file_size,
                limit: self.options.max_file_size,
            }
            .into());
        }

        active.set_status(JobStatus::Uploading)?;
        if let Err(e) = reporter
            .update(ReportStatus::Uploading {
                size_bytes: output.file_size,
            })
            .await
        {
            log::warn!("Failed to report upload start: {}", e);
        }

        let title = if output.metadata.title.is_empty() {
            job.source_url.to_string()
        } else {
            output.metadata.title.clone()
        };
        let upload = UploadRequest {
            chat_id: job.chat_id,
            file_path: output.file_path.clone(),
            file_size: output.file_size,
            caption: build_caption(&title, output.resolution, output.metadata.duration_secs),
            title,
            duration_secs: output.metadata.duration_secs,
            resolution: output.resolution,
            thumbnail_path: output.thumbnail_path.clone(),
        };

        let upload_attempts = (|| self.upload_with_timeout(&upload))
            .retry(self.retry_policy())
            .sleep(tokio::time::sleep)
            .when(|e: &AppError| e.is_retryable() && !cancel.is_cancelled())
            .notify(|e: &AppError, delay: Duration| {
                log::warn!("Upload of job {} failed, retrying in {:?}: {}", job.id.short(), delay, e);
            });
        tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = upload_attempts => result?,
        }

        Ok(Delivered {
            resolution: output.resolution,
            duration_secs: output.metadata.duration_secs,
        })
    }

    /// Download with one retry, forwarding events to the reporter and the job.
    async fn download(
        &self,
        active: &ActiveJob,
        job: &DownloadJob,
        reporter: &mut ProgressReporter,
        request: &DownloadRequest,
    ) -> AppResult<DownloadOutput> {
        let cancel = active.cancel_token();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<DownloadEvent>();
        let batch_prefix = job.batch.map(|b| format!("{}/{} · ", b.index + 1, b.total));

        let download = async {
            let events_tx = events_tx;
            (|| self.downloader.fetch(request, events_tx.clone(), cancel.clone()))
                .retry(self.retry_policy())
                .sleep(tokio::time::sleep)
                .when(|e: &AppError| e.is_retryable() && !cancel.is_cancelled())
                .notify(|e: &AppError, delay: Duration| {
                    log::warn!("Download of job {} failed, retrying in {:?}: {}", job.id.short(), delay, e);
                })
                .await
        };

        let forward = async {
            while let Some(event) = events_rx.recv().await {
                match event {
                    DownloadEvent::Metadata { title, .. } => {
                        active.set_title(&title);
                        reporter.set_title(format!("{}{}", batch_prefix.as_deref().unwrap_or(""), title));
                    }
                    DownloadEvent::ResolutionFallback { requested, chosen } => {
                        active.set_selected_resolution(chosen);
                        reporter.set_note(format!("{} is not available, downloading {} instead.", requested, chosen));
                    }
                    DownloadEvent::Progress(progress) => {
                        active.set_progress(progress.percent);
                        if let Err(e) = reporter.progress(&progress).await {
                            log::warn!("Failed to update progress for job {}: {}", job.id.short(), e);
                        }
                    }
                }
            }
        };

        let (result, ()) = tokio::join!(download, forward);
        result
    }

    async fn upload_with_timeout(&self, request: &UploadRequest) -> AppResult<()> {
        let secs = self.options.upload_timeout.as_secs();
        tokio::time::timeout(self.options.upload_timeout, self.uploader.upload_video(request))
            .await
            .map_err(|_| UploadError::Timeout(secs))?
    }

    fn retry_policy(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.options.retry_delay)
            .with_max_times(1)
    }
}
