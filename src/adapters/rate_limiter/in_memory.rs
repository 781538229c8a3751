//! In-memory sliding-window rate limiter.
//!
//! Keeps a log of request instants per key. Suitable for a single process;
//! use the Redis limiter when several servers share identities.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::RateLimitConfig;

/// In-memory rate limiter for tests and single-server deployments.
#[derive(Debug, Clone)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    /// Request instants per key, oldest first.
    logs: Arc<RwLock<HashMap<RateLimitKey, VecDeque<Instant>>>>,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            logs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a rate limiter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs as u64)
    }

    /// Drops instants that have left the trailing window.
    fn prune(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = log.front() {
            if now.duration_since(*oldest) >= window {
                log.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the oldest logged request expires.
    fn until_oldest_expires(log: &VecDeque<Instant>, now: Instant, window: Duration) -> Duration {
        log.front()
            .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO)
    }

    fn status_for(&self, log: &VecDeque<Instant>, now: Instant) -> RateLimitStatus {
        let window = self.window();
        let wait = Self::until_oldest_expires(log, now, window);
        let reset_at = Timestamp::from_datetime(
            *Timestamp::now().as_datetime()
                + ChronoDuration::from_std(wait).unwrap_or_else(|_| ChronoDuration::zero()),
        );
        RateLimitStatus {
            limit: self.config.max_requests,
            remaining: self.config.max_requests.saturating_sub(log.len() as u32),
            reset_at,
            window_secs: self.config.window_secs,
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let now = Instant::now();
        let window = self.window();
        let mut logs = self.logs.write().await;
        let log = logs.entry(key).or_default();

        Self::prune(log, now, window);

        if log.len() as u32 >= self.config.max_requests {
            let wait = Self::until_oldest_expires(log, now, window);
            let retry_after = wait.as_secs_f64().ceil() as u32;
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit: self.config.max_requests,
                retry_after_secs: retry_after.max(1),
            }));
        }

        log.push_back(now);
        Ok(RateLimitResult::Allowed(self.status_for(log, now)))
    }

    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError> {
        let now = Instant::now();
        let window = self.window();
        let logs = self.logs.read().await;

        let mut log = logs.get(&key).cloned().unwrap_or_default();
        Self::prune(&mut log, now, window);
        Ok(self.status_for(&log, now))
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        self.logs.write().await.remove(&key);
        Ok(())
    }
}
