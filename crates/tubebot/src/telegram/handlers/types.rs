//! Handler types and dependencies

use std::sync::Arc;
use std::time::Instant;

use teloxide::types::UserId;

use tubecore::core::config::Settings;
use tubecore::core::rate_limiter::RateLimiter;
use tubecore::download::cookies::CookieStore;
use tubecore::download::queue::JobQueue;
use tubecore::download::source::DownloadSource;

use crate::telegram::selection::PendingSelections;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub queue: Arc<JobQueue>,
    /// Used for the video preview
    pub source: Arc<dyn DownloadSource>,
    pub rate_limiter: RateLimiter,
    pub cookies: CookieStore,
    pub selections: PendingSelections,
    pub settings: Arc<Settings>,
    pub bot_username: Option<String>,
    pub bot_id: UserId,
    pub started_at: Instant,
}

impl HandlerDeps {
    pub fn new(
        queue: Arc<JobQueue>,
        source: Arc<dyn DownloadSource>,
        rate_limiter: RateLimiter,
        cookies: CookieStore,
        settings: Arc<Settings>,
        bot_username: Option<String>,
        bot_id: UserId,
    ) -> Self {
        Self {
            queue,
            source,
            rate_limiter,
            cookies,
            selections: PendingSelections::default(),
            settings,
            bot_username,
            bot_id,
            started_at: Instant::now(),
        }
    }
}
