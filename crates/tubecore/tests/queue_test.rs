//! Integration tests for scheduling: concurrency bounds, per-chat order and
//! batch expansion through the queue.

mod common;
mod mocks;

use common::*;
use mocks::MockSource;
use std::sync::Arc;
use std::time::Duration;
use tubecore::download::batch::{BatchExpander, BatchTracker};
use tubecore::download::job::{DownloadJob, JobStatus};
use tubecore::download::resolution::Resolution;

/// Takes `count` jobs from the queue as slots free up and runs each one.
async fn drain(harness: &Harness, count: usize) -> Vec<DownloadJob> {
    let mut handles = Vec::with_capacity(count);
    for _ in 0..count {
        let active = tokio::time::timeout(Duration::from_secs(5), harness.queue.next())
            .await
            .expect("queue stalled");
        let runner = Arc::clone(&harness.runner);
        handles.push(tokio::spawn(async move { runner.run(active).await }));
    }

    let mut finished = Vec::with_capacity(count);
    for handle in handles {
        finished.push(handle.await.unwrap().unwrap());
    }
    finished
}

// ==================== Concurrency Tests ====================

mod concurrency_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_global_limit_never_exceeded() {
        let source = MockSource {
            delay: Duration::from_millis(30),
            ..MockSource::default()
        };
        let harness = Harness::builder().source(source).limits(2, 1).build();
        for chat in 1..=6 {
            harness.queue.enqueue(job(chat, &format!("v{}", chat), Resolution::P720)).unwrap();
        }

        let finished = drain(&harness, 6).await;

        assert!(finished.iter().all(|j| j.status == JobStatus::Done));
        assert!(harness.source.max_active() <= 2);
        let stats = harness.queue.stats();
        assert_eq!(stats.completed, 6);
        assert_eq!(stats.running, 0);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn test_single_chat_runs_one_at_a_time() {
        let source = MockSource {
            delay: Duration::from_millis(20),
            ..MockSource::default()
        };
        let harness = Harness::builder().source(source).limits(4, 1).build();
        for i in 0..3 {
            harness.queue.enqueue(job(9, &format!("v{}", i), Resolution::P720)).unwrap();
        }

        drain(&harness, 3).await;

        assert_eq!(harness.source.max_active(), 1);
    }
}

// ==================== Batch Tests ====================

mod batch_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BATCH_FILE: &str = "https://www.youtube.com/one\n\nyoutube.com/two\nhttps://www.youtube.com/three\n";

    #[tokio::test]
    async fn test_batch_runs_in_file_order() {
        let source = MockSource {
            delay: Duration::from_millis(5),
            ..MockSource::default()
        };
        let harness = Harness::builder().source(source).limits(2, 1).build();
        let expander = BatchExpander::from_text(BATCH_FILE);
        let jobs = expander.into_jobs(4, Resolution::P480).unwrap();
        assert_eq!(jobs.len(), 3);
        harness.queue.enqueue_all(jobs).unwrap();

        let tracker = BatchTracker::new();
        let mut report = None;
        for job in drain(&harness, 3).await {
            if let Some(batch) = job.batch {
                report = tracker.record(&batch, job.status == JobStatus::Done).or(report);
            }
        }

        let paths: Vec<String> = harness
            .source
            .downloads()
            .iter()
            .map(|d| d.url.path().to_string())
            .collect();
        assert_eq!(paths, vec!["/one", "/two", "/three"]);
        assert_eq!(harness.source.max_active(), 1);

        let report = report.expect("batch report after last item");
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.total, 3);
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn test_batch_progress_title_is_numbered() {
        let harness = Harness::builder().build();
        let jobs = BatchExpander::from_text(BATCH_FILE).into_jobs(4, Resolution::P720).unwrap();
        harness.queue.enqueue_all(jobs).unwrap();

        drain(&harness, 1).await;

        let first_message = &harness.editor.messages()[0];
        assert!(first_message.text.contains("1/3"), "{}", first_message.text);
    }
}
