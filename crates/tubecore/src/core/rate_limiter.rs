use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::core::config::{self, Settings};
use crate::core::error::{AppError, AppResult};

/// Sliding-window request limiter per chat.
///
/// Two windows apply at once: a short one (one minute) and a long one (one
/// hour). A request is accepted only when both have room; accepted requests
/// are recorded in both.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<i64, VecDeque<Instant>>>>,
    per_minute: usize,
    per_hour: usize,
}

/// Snapshot of one chat's usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStats {
    pub last_minute: usize,
    pub max_per_minute: usize,
    pub last_hour: usize,
    pub max_per_hour: usize,
}

impl RateLimitStats {
    pub fn can_make_request(&self) -> bool {
        self.last_minute < self.max_per_minute && self.last_hour < self.max_per_hour
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(config::rate_limit::PER_MINUTE, config::rate_limit::PER_HOUR)
    }
}

impl RateLimiter {
    pub fn new(per_minute: usize, per_hour: usize) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            per_minute,
            per_hour,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.rate_limit_per_minute, settings.rate_limit_per_hour)
    }

    fn prune(times: &mut VecDeque<Instant>, now: Instant) {
        let hour = config::rate_limit::hour_window();
        while times.front().is_some_and(|t| now.duration_since(*t) >= hour) {
            times.pop_front();
        }
    }

    fn wait_time(&self, times: &VecDeque<Instant>, now: Instant) -> Option<Duration> {
        let minute = config::rate_limit::minute_window();
        let hour = config::rate_limit::hour_window();

        let in_minute: Vec<&Instant> = times.iter().filter(|t| now.duration_since(**t) < minute).collect();
        let minute_wait = (in_minute.len() >= self.per_minute)
            .then(|| in_minute.first().map(|oldest| minute - now.duration_since(**oldest)))
            .flatten();

        let hour_wait = (times.len() >= self.per_hour)
            .then(|| times.front().map(|oldest| hour - now.duration_since(*oldest)))
            .flatten();

        match (minute_wait, hour_wait) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Records a request for the chat, or fails with a quota error naming the wait.
    pub async fn check(&self, chat_id: i64) -> AppResult<()> {
        let now = Instant::now();
        let mut requests = self.requests.lock().await;
        let times = requests.entry(chat_id).or_default();
        Self::prune(times, now);

        if let Some(wait) = self.wait_time(times, now) {
            let secs = wait.as_secs().max(1);
            log::warn!("⏳ Rate limit hit for chat {}, {}s to wait", chat_id, secs);
            return Err(AppError::Quota(format!(
                "Too many requests. Please try again in {}s.",
                secs
            )));
        }

        times.push_back(now);
        Ok(())
    }

    /// Time until the chat may send the next request, if it is limited now.
    pub async fn remaining_wait(&self, chat_id: i64) -> Option<Duration> {
        let now = Instant::now();
        let mut requests = self.requests.lock().await;
        let times = requests.get_mut(&chat_id)?;
        Self::prune(times, now);
        self.wait_time(times, now)
    }

    pub async fn stats(&self, chat_id: i64) -> RateLimitStats {
        let now = Instant::now();
        let requests = self.requests.lock().await;
        let minute = config::rate_limit::minute_window();
        let hour = config::rate_limit::hour_window();
        let (last_minute, last_hour) = requests
            .get(&chat_id)
            .map(|times| {
                (
                    times.iter().filter(|t| now.duration_since(**t) < minute).count(),
                    times.iter().filter(|t| now.duration_since(**t) < hour).count(),
                )
            })
            .unwrap_or((0, 0));
        RateLimitStats {
            last_minute,
            max_per_minute: self.per_minute,
            last_hour,
            max_per_hour: self.per_hour,
        }
    }

    /// Drops chats without requests in the last hour.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.lock().await;
        requests.retain(|_, times| {
            Self::prune(times, now);
            !times.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ==================== Window Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_minute_window() {
        let limiter = RateLimiter::new(2, 10);
        limiter.check(1).await.unwrap();
        limiter.check(1).await.unwrap();

        let err = limiter.check(1).await.unwrap_err();
        assert!(matches!(err, AppError::Quota(_)));
        assert_eq!(limiter.remaining_wait(1).await, Some(Duration::from_secs(60)));

        // Other chats are unaffected
        limiter.check(2).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        limiter.check(1).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hour_window() {
        let limiter = RateLimiter::new(10, 3);
        for _ in 0..3 {
            limiter.check(1).await.unwrap();
            tokio::time::advance(Duration::from_secs(61)).await;
        }
        assert!(limiter.check(1).await.is_err());

        let wait = limiter.remaining_wait(1).await.unwrap();
        assert_eq!(wait, Duration::from_secs(3600 - 3 * 61));

        tokio::time::advance(wait).await;
        limiter.check(1).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_requests_are_not_recorded() {
        let limiter = RateLimiter::new(1, 10);
        limiter.check(1).await.unwrap();
        assert!(limiter.check(1).await.is_err());
        assert!(limiter.check(1).await.is_err());
        let stats = limiter.stats(1).await;
        assert_eq!(stats.last_minute, 1);
        assert_eq!(stats.last_hour, 1);
        assert!(!stats.can_make_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_forgets_idle_chats() {
        let limiter = RateLimiter::default();
        limiter.check(1).await.unwrap();
        tokio::time::advance(Duration::from_secs(3600)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.requests.lock().await.len(), 0);
        assert!(limiter.stats(1).await.can_make_request());
    }
}
