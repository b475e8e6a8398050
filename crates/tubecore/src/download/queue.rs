//! Job queue with global and per-chat concurrency limits.
//!
//! Jobs wait in FIFO order. [`JobQueue::next`] hands out the oldest job whose
//! chat still has a free slot, as long as the global limit allows it. A
//! running job is represented by an [`ActiveJob`]; finishing or dropping it
//! releases the slot.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::core::config::Settings;
use crate::core::error::{AppError, AppResult};
use crate::download::job::{DownloadJob, JobId, JobStatus};
use crate::download::resolution::Resolution;

/// Reason stored on jobs cancelled by the user
pub const CANCELLED_REASON: &str = "cancelled";

/// Capacity of the status update channel
const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    pub max_concurrent: usize,
    pub max_per_chat: usize,
    pub max_queue_size: usize,
}

impl From<&Settings> for QueueLimits {
    fn from(settings: &Settings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent_downloads,
            max_per_chat: settings.max_per_chat,
            max_queue_size: settings.max_queue_size,
        }
    }
}

/// Status change broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub job_id: JobId,
    pub chat_id: i64,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub error: Option<String>,
}

impl From<&DownloadJob> for JobUpdate {
    fn from(job: &DownloadJob) -> Self {
        Self {
            job_id: job.id,
            chat_id: job.chat_id,
            status: job.status,
            progress_percent: job.progress_percent,
            error: job.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub max_concurrent: usize,
}

struct Entry {
    job: DownloadJob,
    cancel: CancellationToken,
    seq: u64,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<JobId>,
    jobs: HashMap<JobId, Entry>,
    running: HashSet<JobId>,
    per_chat: HashMap<i64, usize>,
    next_seq: u64,
    completed: usize,
    failed: usize,
}

impl QueueState {
    fn release_slot(&mut self, id: JobId, chat_id: i64) {
        if self.running.remove(&id) {
            if let Some(count) = self.per_chat.get_mut(&chat_id) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.per_chat.remove(&chat_id);
                }
            }
        }
    }

    fn chat_running(&self, chat_id: i64) -> usize {
        self.per_chat.get(&chat_id).copied().unwrap_or(0)
    }
}

/// Download job queue shared between the bot frontend and the worker loop.
pub struct JobQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    limits: QueueLimits,
    updates: broadcast::Sender<JobUpdate>,
    finished: Mutex<Vec<mpsc::UnboundedSender<DownloadJob>>>,
}

impl JobQueue {
    pub fn new(limits: QueueLimits) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            limits,
            updates,
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, job: &DownloadJob) {
        // No subscribers is fine
        let _ = self.updates.send(JobUpdate::from(job));
    }

    /// Hands a job that just became terminal to every finished-job subscriber.
    fn publish_finished(&self, job: &DownloadJob) {
        let mut subscribers = self.finished.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(job.clone()).is_ok());
    }

    /// Adds a job to the end of the queue.
    pub fn enqueue(&self, job: DownloadJob) -> AppResult<JobId> {
        let mut ids = self.enqueue_all(vec![job])?;
        ids.pop()
            .ok_or_else(|| AppError::Validation("enqueue produced no id".to_string()))
    }

    /// Adds several jobs atomically: either all are queued, in order, or none.
    pub fn enqueue_all(&self, jobs: Vec<DownloadJob>) -> AppResult<Vec<JobId>> {
        let mut state = self.lock();

        if state.pending.len() + jobs.len() > self.limits.max_queue_size {
            log::warn!(
                "Queue is full ({} waiting), rejecting {} job(s)",
                state.pending.len(),
                jobs.len()
            );
            return Err(AppError::Quota(format!(
                "The queue is full ({} jobs waiting). Please try again later.",
                state.pending.len()
            )));
        }
        for job in &jobs {
            if state.jobs.contains_key(&job.id) {
                return Err(AppError::Input(format!("Job {} is already queued", job.id)));
            }
            if job.status != JobStatus::Queued {
                return Err(AppError::InvalidTransition {
                    from: job.status,
                    to: JobStatus::Queued,
                });
            }
        }

        let mut ids = Vec::with_capacity(jobs.len());
        for job in jobs {
            let id = job.id;
            log::info!("📥 Job {} queued for chat {}: {}", id.short(), job.chat_id, job.source_url);
            self.publish(&job);
            let seq = state.next_seq;
            state.next_seq += 1;
            state.jobs.insert(
                id,
                Entry {
                    job,
                    cancel: CancellationToken::new(),
                    seq,
                },
            );
            state.pending.push_back(id);
            ids.push(id);
        }
        drop(state);

        self.notify.notify_waiters();
        Ok(ids)
    }

    /// Starts the next runnable job, if limits allow one right now.
    pub fn try_next(self: &Arc<Self>) -> Option<ActiveJob> {
        let mut state = self.lock();
        if state.running.len() >= self.limits.max_concurrent {
            return None;
        }

        let max_per_chat = self.limits.max_per_chat;
        let pos = state.pending.iter().position(|id| {
            state
                .jobs
                .get(id)
                .is_some_and(|entry| state.chat_running(entry.job.chat_id) < max_per_chat)
        })?;
        let id = state.pending.remove(pos)?;

        let entry = state.jobs.get_mut(&id)?;
        if let Err(e) = entry.job.transition(JobStatus::Running) {
            log::error!("Job {} could not start: {}", id.short(), e);
            return None;
        }
        let chat_id = entry.job.chat_id;
        let cancel = entry.cancel.clone();
        self.publish(&entry.job);

        state.running.insert(id);
        *state.per_chat.entry(chat_id).or_insert(0) += 1;
        log::info!(
            "▶️ Job {} started ({}/{} running)",
            id.short(),
            state.running.len(),
            self.limits.max_concurrent
        );

        Some(ActiveJob {
            queue: Arc::clone(self),
            id,
            chat_id,
            cancel,
            finished: false,
        })
    }

    /// Waits until a job can start and returns it.
    pub async fn next(self: &Arc<Self>) -> ActiveJob {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.try_next() {
                return job;
            }
            notified.await;
        }
    }

    fn cancel_locked(&self, state: &mut QueueState, id: JobId) -> AppResult<DownloadJob> {
        let entry = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::Input("Job not found or already finished".to_string()))?;
        if entry.job.is_terminal() {
            return Err(AppError::Input("Job already finished".to_string()));
        }

        let was_queued = entry.job.status == JobStatus::Queued;
        entry.job.fail(CANCELLED_REASON)?;
        entry.cancel.cancel();
        let job = entry.job.clone();
        self.publish(&job);
        self.publish_finished(&job);
        state.failed += 1;

        if was_queued {
            state.pending.retain(|pending| *pending != id);
            state.jobs.remove(&id);
        } else {
            // The ActiveJob handle collects the entry when it finishes
            state.release_slot(id, job.chat_id);
        }
        log::info!("🚫 Job {} cancelled", id.short());
        Ok(job)
    }

    /// Cancels a queued or running job. Its slot is free when this returns.
    pub fn cancel(&self, id: JobId) -> AppResult<DownloadJob> {
        let job = {
            let mut state = self.lock();
            self.cancel_locked(&mut state, id)?
        };
        self.notify.notify_waiters();
        Ok(job)
    }

    /// Cancels every unfinished job of a chat.
    pub fn cancel_chat(&self, chat_id: i64) -> Vec<DownloadJob> {
        let cancelled = {
            let mut state = self.lock();
            let mut ids: Vec<(u64, JobId)> = state
                .jobs
                .iter()
                .filter(|(_, e)| e.job.chat_id == chat_id && !e.job.is_terminal())
                .map(|(id, e)| (e.seq, *id))
                .collect();
            ids.sort_unstable_by_key(|(seq, _)| *seq);
            ids.into_iter()
                .filter_map(|(_, id)| self.cancel_locked(&mut state, id).ok())
                .collect::<Vec<_>>()
        };
        if !cancelled.is_empty() {
            self.notify.notify_waiters();
        }
        cancelled
    }

    pub fn get(&self, id: JobId) -> Option<DownloadJob> {
        self.lock().jobs.get(&id).map(|e| e.job.clone())
    }

    /// Unfinished jobs of a chat in submission order.
    pub fn jobs_for_chat(&self, chat_id: i64) -> Vec<DownloadJob> {
        let state = self.lock();
        let mut entries: Vec<&Entry> = state
            .jobs
            .values()
            .filter(|e| e.job.chat_id == chat_id && !e.job.is_terminal())
            .collect();
        entries.sort_unstable_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.job.clone()).collect()
    }

    /// One-based position among waiting jobs.
    pub fn position(&self, id: JobId) -> Option<usize> {
        self.lock().pending.iter().position(|p| *p == id).map(|p| p + 1)
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            queued: state.pending.len(),
            running: state.running.len(),
            completed: state.completed,
            failed: state.failed,
            max_concurrent: self.limits.max_concurrent,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.updates.subscribe()
    }

    /// Every job that reaches Done or Failed from now on, exactly once.
    ///
    /// Covers jobs cancelled while still queued, which never reach a worker.
    /// Unlike [`JobQueue::subscribe`] the channel is unbounded, so a slow
    /// consumer misses nothing.
    pub fn subscribe_finished(&self) -> mpsc::UnboundedReceiver<DownloadJob> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.finished.lock().unwrap_or_else(PoisonError::into_inner).push(tx);
        rx
    }

    fn update_running<R>(&self, id: JobId, f: impl FnOnce(&mut DownloadJob) -> AppResult<R>) -> AppResult<R> {
        let mut state = self.lock();
        let entry = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::Input("Job not found".to_string()))?;
        if entry.job.is_terminal() {
            return Err(AppError::Cancelled);
        }
        let result = f(&mut entry.job)?;
        self.publish(&entry.job);
        Ok(result)
    }

    fn complete(&self, id: JobId, outcome: Result<(), String>) -> Option<DownloadJob> {
        let job = {
            let mut state = self.lock();
            let mut entry = state.jobs.remove(&id)?;

            if !entry.job.is_terminal() {
                let finished = match outcome {
                    Ok(()) => entry.job.transition(JobStatus::Done),
                    Err(reason) => entry.job.fail(reason),
                };
                if let Err(e) = finished {
                    log::error!("Job {} finished in a bad state: {}", id.short(), e);
                    let _ = entry.job.fail(e.to_string());
                }
                match entry.job.status {
                    JobStatus::Done => state.completed += 1,
                    _ => state.failed += 1,
                }
                state.release_slot(id, entry.job.chat_id);
                self.publish(&entry.job);
                self.publish_finished(&entry.job);
            }
            entry.job
        };

        log::info!("🏁 Job {} finished: {}", id.short(), job.status);
        self.notify.notify_waiters();
        Some(job)
    }
}

/// Handle of a running job.
///
/// Dropping it without calling [`ActiveJob::finish`] fails the job.
pub struct ActiveJob {
    queue: Arc<JobQueue>,
    id: JobId,
    chat_id: i64,
    cancel: CancellationToken,
    finished: bool,
}

impl std::fmt::Debug for ActiveJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveJob")
            .field("id", &self.id)
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl ActiveJob {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current state of the job.
    pub fn snapshot(&self) -> Option<DownloadJob> {
        self.queue.get(self.id)
    }

    pub fn set_status(&self, status: JobStatus) -> AppResult<()> {
        self.queue.update_running(self.id, |job| job.transition(status))
    }

    pub fn set_progress(&self, percent: u8) {
        let _ = self.queue.update_running(self.id, |job| {
            job.set_progress(percent);
            Ok(())
        });
    }

    pub fn set_selected_resolution(&self, resolution: Resolution) {
        let _ = self.queue.update_running(self.id, |job| {
            job.selected_resolution = Some(resolution);
            Ok(())
        });
    }

    pub fn set_title(&self, title: &str) {
        let _ = self.queue.update_running(self.id, |job| {
            job.title = Some(title.to_string());
            Ok(())
        });
    }

    /// Finishes the job: `Ok` moves it to Done, `Err` to Failed with the reason.
    ///
    /// Returns the final job, which no longer lives in the queue.
    pub fn finish(mut self, outcome: Result<(), String>) -> Option<DownloadJob> {
        self.finished = true;
        self.queue.complete(self.id, outcome)
    }
}

impl Drop for ActiveJob {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!("Job {} dropped without finishing", self.id.short());
            self.queue.complete(self.id, Err("worker stopped".to_string()));
        }
    }
}
