//! Mock implementations of the download and chat seams
//!
//! Lets the job runner and queue be exercised without yt-dlp or Telegram.

#![allow(dead_code)]

pub mod mock_chat;
pub mod mock_source;

pub use mock_chat::{RecordingEditor, RecordingUploader};
pub use mock_source::MockSource;
