//! tubecore - download engine of the tubebot Telegram bot
//!
//! Turns YouTube links into local video files with yt-dlp and schedules that
//! work fairly between chats. Nothing here talks to Telegram directly; the
//! chat side is reached through the `MessageEditor` and `MediaUploader` traits.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, rate limiting, health server
//! - `download`: yt-dlp adapter, batch lists, job queue, progress, job runner

pub mod core;
pub mod download;

// Re-export commonly used types for convenience
pub use core::{AppError, AppResult, Settings};
pub use download::{DownloadJob, JobQueue, JobRunner, JobStatus, Resolution, ResolutionPolicy};
