//! Shared setup for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

use tubecore::download::cookies::CookieStore;
use tubecore::download::downloader::Downloader;
use tubecore::download::job::DownloadJob;
use tubecore::download::pipeline::{JobRunner, RunnerOptions};
use tubecore::download::queue::{JobQueue, QueueLimits};
use tubecore::download::resolution::{Resolution, ResolutionPolicy};

use crate::mocks::{MockSource, RecordingEditor, RecordingUploader};

#[allow(unused_imports)]
pub use pretty_assertions::assert_eq;

pub const MAX_DURATION_SECS: u64 = 7200;

pub fn video_url(id: &str) -> Url {
    Url::parse(&format!("https://www.youtube.com/{}", id)).unwrap()
}

pub fn job(chat_id: i64, id: &str, resolution: Resolution) -> DownloadJob {
    DownloadJob::new(chat_id, video_url(id), resolution)
}

/// Runner options without any waiting
pub fn fast_options(temp_dir: &std::path::Path) -> RunnerOptions {
    RunnerOptions {
        temp_dir: temp_dir.to_path_buf(),
        progress_interval: Duration::ZERO,
        batch_item_delay: Duration::ZERO,
        retry_delay: Duration::ZERO,
        upload_timeout: Duration::from_secs(5),
        max_file_size: 10 * 1024 * 1024,
    }
}

/// Queue and runner wired to mocks
pub struct Harness {
    pub dir: TempDir,
    pub queue: Arc<JobQueue>,
    pub runner: Arc<JobRunner>,
    pub source: Arc<MockSource>,
    pub editor: Arc<RecordingEditor>,
    pub uploader: Arc<RecordingUploader>,
    pub cookies: CookieStore,
}

pub struct HarnessBuilder {
    source: MockSource,
    uploader: RecordingUploader,
    policy: ResolutionPolicy,
    limits: QueueLimits,
    max_file_size: Option<u64>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            source: MockSource::default(),
            uploader: RecordingUploader::default(),
            policy: ResolutionPolicy::BestBelow,
            limits: QueueLimits {
                max_concurrent: 2,
                max_per_chat: 1,
                max_queue_size: 100,
            },
            max_file_size: None,
        }
    }
}

impl HarnessBuilder {
    pub fn source(mut self, source: MockSource) -> Self {
        self.source = source;
        self
    }

    pub fn uploader(mut self, uploader: RecordingUploader) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn limits(mut self, max_concurrent: usize, max_per_chat: usize) -> Self {
        self.limits.max_concurrent = max_concurrent;
        self.limits.max_per_chat = max_per_chat;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn build(self) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(self.source);
        let editor = Arc::new(RecordingEditor::default());
        let uploader = Arc::new(self.uploader);
        let cookies = CookieStore::new(dir.path().join("cookies"), None);

        let mut options = fast_options(&dir.path().join("scratch"));
        if let Some(limit) = self.max_file_size {
            options.max_file_size = limit;
        }

        let downloader = Downloader::new(source.clone(), self.policy, MAX_DURATION_SECS);
        let runner = JobRunner::new(downloader, uploader.clone(), editor.clone(), cookies.clone(), options);

        Harness {
            queue: Arc::new(JobQueue::new(self.limits)),
            runner: Arc::new(runner),
            source,
            editor,
            uploader,
            cookies,
            dir,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn scratch_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("scratch")
    }

    /// Number of entries left in the scratch directory
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch_dir()).map(|d| d.count()).unwrap_or(0)
    }

    /// Enqueues one job and runs it to completion.
    pub async fn run_one(&self, job: DownloadJob) -> DownloadJob {
        self.queue.enqueue(job).unwrap();
        let active = self.queue.try_next().expect("job should start");
        self.runner.run(active).await.expect("job should finish")
    }
}

/// Polls `check` until it holds or two seconds pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
