//! Download management and processing

pub mod batch;
pub mod cookies;
pub mod downloader;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod reporter;
pub mod resolution;
pub mod source;
pub mod ytdlp_errors;

// Re-exports for convenience
pub use batch::{BatchExpander, BatchReport, BatchTracker};
pub use cookies::CookieStore;
pub use downloader::Downloader;
pub use error::{DownloadError, UploadError};
pub use job::{DownloadJob, JobId, JobStatus};
pub use pipeline::{JobRunner, MediaUploader, RunnerOptions, UploadRequest};
pub use progress::{DownloadEvent, SourceProgress};
pub use queue::{ActiveJob, JobQueue, QueueLimits};
pub use reporter::{MessageEditor, ProgressReporter};
pub use resolution::{Resolution, ResolutionPolicy};
pub use source::{DownloadSource, YtDlpSource};
