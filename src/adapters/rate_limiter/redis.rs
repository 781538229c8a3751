//! Redis-backed sliding-window rate limiter.
//!
//! Each key is a sorted set of request timestamps (milliseconds). Pruning,
//! counting and recording happen inside one Lua script so concurrent
//! servers cannot both take the last slot.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::RateLimitConfig;

/// Returns {allowed, count, oldest_ms}. A denied call leaves the set untouched.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
if count >= limit then
  local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
  return {0, count, tonumber(oldest[2])}
end
redis.call('ZADD', key, now, ARGV[4])
redis.call('PEXPIRE', key, window)
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
return {1, count + 1, tonumber(oldest[2])}
"#;

fn ceil_secs(millis: i64) -> u64 {
    (millis.max(0) as u64 + 999) / 1000
}

#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    config: RateLimitConfig,
    script: Arc<Script>,
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection, config: RateLimitConfig) -> Self {
        Self {
            conn,
            config,
            script: Arc::new(Script::new(SLIDING_WINDOW_SCRIPT)),
        }
    }

    fn window_ms(&self) -> i64 {
        self.config.window_secs as i64 * 1000
    }

    /// Milliseconds until the oldest request leaves the window.
    fn wait_ms(&self, oldest_ms: i64, now_ms: i64) -> i64 {
        (oldest_ms + self.window_ms() - now_ms).max(0)
    }

    fn build_status(&self, count: u32, oldest_ms: Option<i64>, now_ms: i64) -> RateLimitStatus {
        let wait_ms = oldest_ms.map(|o| self.wait_ms(o, now_ms)).unwrap_or(0);
        RateLimitStatus {
            limit: self.config.max_requests,
            remaining: self.config.max_requests.saturating_sub(count),
            reset_at: Timestamp::now().plus_secs(ceil_secs(wait_ms)),
            window_secs: self.config.window_secs,
        }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let redis_key = key.to_redis_key();
        let now_ms = Timestamp::now().as_unix_millis();
        let mut conn = self.conn.clone();

        let reply: Vec<i64> = self
            .script
            .key(&redis_key)
            .arg(now_ms)
            .arg(self.window_ms())
            .arg(self.config.max_requests)
            .arg(format!("{}-{}", now_ms, Uuid::new_v4()))
            .invoke_async(&mut conn)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        let (allowed, count, oldest_ms) = match reply.as_slice() {
            [allowed, count, oldest] => (*allowed == 1, *count as u32, *oldest),
            _ => {
                return Err(RateLimitError::Unavailable(format!(
                    "unexpected script reply: {:?}",
                    reply
                )))
            }
        };

        if !allowed {
            let retry_after = ceil_secs(self.wait_ms(oldest_ms, now_ms)) as u32;
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit: self.config.max_requests,
                retry_after_secs: retry_after.max(1),
            }));
        }

        Ok(RateLimitResult::Allowed(self.build_status(
            count,
            Some(oldest_ms),
            now_ms,
        )))
    }

    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError> {
        let redis_key = key.to_redis_key();
        let now_ms = Timestamp::now().as_unix_millis();
        let mut conn = self.conn.clone();

        let (count, oldest): (u32, Vec<(String, i64)>) = redis::pipe()
            .cmd("ZCOUNT")
            .arg(&redis_key)
            .arg(format!("({}", now_ms - self.window_ms()))
            .arg("+inf")
            .cmd("ZRANGEBYSCORE")
            .arg(&redis_key)
            .arg(format!("({}", now_ms - self.window_ms()))
            .arg("+inf")
            .arg("WITHSCORES")
            .arg("LIMIT")
            .arg(0)
            .arg(1)
            .query_async(&mut conn)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        Ok(self.build_status(count, oldest.first().map(|(_, score)| *score), now_ms))
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key.to_redis_key())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
