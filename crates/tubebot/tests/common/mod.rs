//! Shared setup for the worker tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use tubecore::download::cookies::CookieStore;
use tubecore::download::downloader::Downloader;
use tubecore::download::pipeline::{JobRunner, RunnerOptions};
use tubecore::download::queue::{JobQueue, QueueLimits};
use tubecore::download::resolution::ResolutionPolicy;

use crate::mocks::{InstantSource, NullUploader, RecordingEditor};

pub struct Setup {
    pub dir: TempDir,
    pub queue: Arc<JobQueue>,
    pub runner: Arc<JobRunner>,
    pub editor: Arc<RecordingEditor>,
    pub uploader: Arc<NullUploader>,
}

pub fn setup() -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let editor = Arc::new(RecordingEditor::default());
    let uploader = Arc::new(NullUploader::default());
    let options = RunnerOptions {
        temp_dir: dir.path().join("scratch"),
        progress_interval: Duration::ZERO,
        batch_item_delay: Duration::ZERO,
        retry_delay: Duration::ZERO,
        upload_timeout: Duration::from_secs(5),
        max_file_size: 1024,
    };
    let downloader = Downloader::new(Arc::new(InstantSource), ResolutionPolicy::BestBelow, 7200);
    let runner = JobRunner::new(
        downloader,
        uploader.clone(),
        editor.clone(),
        CookieStore::new(dir.path().join("cookies"), None),
        options,
    );

    Setup {
        queue: Arc::new(JobQueue::new(QueueLimits {
            max_concurrent: 2,
            max_per_chat: 1,
            max_queue_size: 100,
        })),
        runner: Arc::new(runner),
        editor,
        uploader,
        dir,
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
