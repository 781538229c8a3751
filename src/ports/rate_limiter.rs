//! Rate limiting port for throttling per-identity requests.
//!
//! Limits are expressed as a sliding log: at most `limit` requests in any
//! trailing window of `window_secs`. A denied request is not recorded, so a
//! client hammering the endpoint does not extend its own lockout.

use async_trait::async_trait;
use std::fmt;

use crate::domain::foundation::{Timestamp, UserId};

/// Resource name for match requests.
pub const MATCH_START_RESOURCE: &str = "match_start";

/// Port for rate limiting operations.
///
/// Implementations must be safe under concurrent `check` calls for the same key.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records the request and returns `Allowed` if the window has room,
    /// otherwise returns `Denied` without recording anything.
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError>;

    /// Current quota without recording a request.
    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError>;

    /// Forgets every recorded request for the key.
    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError>;
}

/// Identity plus the resource being throttled.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    pub identifier: String,
    pub resource: String,
}

impl RateLimitKey {
    /// Creates a user-based rate limit key for a specific resource.
    pub fn user_resource(user_id: &UserId, resource: &str) -> Self {
        Self {
            identifier: user_id.to_string(),
            resource: resource.to_string(),
        }
    }

    /// Key used for `match:start` throttling.
    pub fn match_start(user_id: &UserId) -> Self {
        Self::user_resource(user_id, MATCH_START_RESOURCE)
    }

    /// Returns the Redis key string for this rate limit key.
    pub fn to_redis_key(&self) -> String {
        format!("ratelimit:{}:{}", self.resource, self.identifier)
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.identifier)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed; includes current status.
    Allowed(RateLimitStatus),
    /// Request is denied; includes denial details.
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    /// Returns true if the request was allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    /// Returns true if the request was denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }
}

/// Current rate limit status.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Requests still available right now.
    pub remaining: u32,
    /// When the oldest recorded request leaves the window.
    pub reset_at: Timestamp,
    pub window_secs: u32,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone)]
pub struct RateLimitDenied {
    pub limit: u32,
    /// Seconds until the oldest request leaves the window.
    pub retry_after_secs: u32,
}

/// Errors that can occur during rate limiting operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Rate limiter backend is unavailable.
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}
