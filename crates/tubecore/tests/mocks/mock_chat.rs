//! Recording stand-ins for the Telegram side

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;

use tubecore::core::error::AppResult;
use tubecore::download::error::UploadError;
use tubecore::download::pipeline::{MediaUploader, UploadRequest};
use tubecore::download::reporter::MessageEditor;

/// Message as it currently reads in the chat
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
    pub edits: usize,
}

#[derive(Default)]
pub struct RecordingEditor {
    next_id: AtomicI32,
    messages: Mutex<Vec<ChatMessage>>,
}

impl RecordingEditor {
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last_text(&self, chat_id: i64) -> Option<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.chat_id == chat_id)
            .map(|m| m.text.clone())
    }
}

#[async_trait]
impl MessageEditor for RecordingEditor {
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<i32> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.messages.lock().unwrap().push(ChatMessage {
            chat_id,
            message_id,
            text: text.to_string(),
            edits: 0,
        });
        Ok(message_id)
    }

    async fn edit(&self, chat_id: i64, message_id: i32, text: &str) -> AppResult<()> {
        let mut messages = self.messages.lock().unwrap();
        if let Some(message) = messages
            .iter_mut()
            .find(|m| m.chat_id == chat_id && m.message_id == message_id)
        {
            message.text = text.to_string();
            message.edits += 1;
        }
        Ok(())
    }
}

/// One recorded upload with the state of the file at upload time
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub request: UploadRequest,
    pub file_existed: bool,
}

#[derive(Default)]
pub struct RecordingUploader {
    /// Number of upcoming calls that fail with a retryable error
    pub fail_times: AtomicUsize,
    pub calls: AtomicUsize,
    uploads: Mutex<Vec<RecordedUpload>>,
    /// Runs at the start of every upload
    hook: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl RecordingUploader {
    pub fn failing(times: usize) -> Self {
        Self {
            fail_times: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    pub fn on_upload(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaUploader for RecordingUploader {
    async fn upload_video(&self, request: &UploadRequest) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook();
        }
        let should_fail = self
            .fail_times
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(UploadError::Rejected("Bad Gateway".to_string()).into());
        }

        self.uploads.lock().unwrap().push(RecordedUpload {
            request: request.clone(),
            file_existed: request.file_path.exists(),
        });
        Ok(())
    }
}
