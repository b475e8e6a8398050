use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use url::Url;
use uuid::Uuid;

use crate::core::error::{AppError, AppResult};
use crate::download::resolution::Resolution;

/// Unique identifier of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, enough for logs and callback data
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(JobId)
    }
}

/// Lifecycle of a download job.
///
/// Queued → Running → Uploading → Done, or any non-terminal state → Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Uploading,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Running, Uploading) | (Uploading, Done) | (Queued | Running | Uploading, Failed)
        )
    }
}

/// Position of a job inside a batch upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchRef {
    pub batch_id: Uuid,
    /// Zero-based index in file order
    pub index: usize,
    pub total: usize,
}

impl BatchRef {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }
}

/// A single URL to download and deliver to one chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadJob {
    pub id: JobId,
    pub chat_id: i64,
    /// Telegram user who submitted the link, when known
    pub requested_by: Option<u64>,
    pub source_url: Url,
    pub requested_resolution: Resolution,
    /// Resolution actually downloaded, after fallback
    pub selected_resolution: Option<Resolution>,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub error: Option<String>,
    /// Title learned from metadata
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub batch: Option<BatchRef>,
}

impl DownloadJob {
    pub fn new(chat_id: i64, source_url: Url, requested_resolution: Resolution) -> Self {
        Self {
            id: JobId::new(),
            chat_id,
            requested_by: None,
            source_url,
            requested_resolution,
            selected_resolution: None,
            status: JobStatus::Queued,
            progress_percent: 0,
            error: None,
            title: None,
            created_at: Utc::now(),
            batch: None,
        }
    }

    pub fn with_batch(mut self, batch: BatchRef) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn with_requested_by(mut self, user_id: u64) -> Self {
        self.requested_by = Some(user_id);
        self
    }

    /// Moves the job to `next`, rejecting regressions and moves out of terminal states.
    pub fn transition(&mut self, next: JobStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next == JobStatus::Done {
            self.progress_percent = 100;
        }
        Ok(())
    }

    /// Records progress. Lower values than already seen are ignored.
    pub fn set_progress(&mut self, percent: u8) {
        self.progress_percent = self.progress_percent.max(percent.min(100));
    }

    /// Moves the job to Failed with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> AppResult<()> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
