//! Worker loop: takes runnable jobs from the queue and runs each in its own task.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tubecore::core::utils::escape_markdown_v2;
use tubecore::download::batch::BatchTracker;
use tubecore::download::job::{DownloadJob, JobStatus};
use tubecore::download::pipeline::JobRunner;
use tubecore::download::queue::{ActiveJob, JobQueue};
use tubecore::download::reporter::MessageEditor;

pub struct Worker {
    queue: Arc<JobQueue>,
    runner: Arc<JobRunner>,
    batches: Arc<BatchTracker>,
    notifier: Arc<dyn MessageEditor>,
    finished: mpsc::UnboundedReceiver<DownloadJob>,
}

impl Worker {
    pub fn new(queue: Arc<JobQueue>, runner: Arc<JobRunner>, notifier: Arc<dyn MessageEditor>) -> Self {
        let finished = queue.subscribe_finished();
        Self {
            queue,
            runner,
            batches: Arc::new(BatchTracker::new()),
            notifier,
            finished,
        }
    }

    /// Batches with jobs still outstanding
    pub fn batches(&self) -> Arc<BatchTracker> {
        Arc::clone(&self.batches)
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Concurrency is bounded by the queue: `next` only hands out a job when
    /// a global and a per-chat slot are free. Batch summaries are driven by
    /// the queue's finished-job stream, so jobs cancelled before they ever
    /// started still count.
    pub async fn run(mut self, shutdown: CancellationToken) {
        log::info!(
            "⚙️ Worker started (max {} concurrent downloads)",
            self.queue.limits().max_concurrent
        );
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                active = self.queue.next() => self.spawn_job(active),
                Some(job) = self.finished.recv() => self.spawn_batch_report(job),
            }
        }
        log::info!("Worker stopped");
    }

    fn spawn_job(&self, active: ActiveJob) {
        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move {
            runner.run(active).await;
        });
    }

    fn spawn_batch_report(&self, job: DownloadJob) {
        if job.batch.is_none() {
            return;
        }
        let batches = Arc::clone(&self.batches);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            report_batch_progress(&batches, notifier.as_ref(), &job).await;
        });
    }
}

/// Sends the batch summary once the last job of a batch finished.
pub async fn report_batch_progress(batches: &BatchTracker, notifier: &dyn MessageEditor, job: &DownloadJob) {
    let Some(batch) = job.batch else {
        return;
    };
    let Some(report) = batches.record(&batch, job.status == JobStatus::Done) else {
        return;
    };

    log::info!(
        "📦 Batch {} finished for chat {}: {}/{} succeeded",
        batch.batch_id,
        job.chat_id,
        report.succeeded,
        report.total
    );
    if let Err(e) = notifier
        .send(job.chat_id, &escape_markdown_v2(&report.to_message()))
        .await
    {
        log::warn!("Failed to send batch summary to chat {}: {}", job.chat_id, e);
    }
}
