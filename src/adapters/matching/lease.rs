//! Single-server lease over a Redis key prefix.
//!
//! Queue and active flags live in Redis, but open connections and live
//! sessions are held in process memory. A second server sharing the prefix
//! could pair a local waiter with someone it cannot notify, so startup takes
//! `{prefix}:instance` with `SET NX EX` and a background task keeps renewing it.

use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::Script;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode};

use super::keys::MatchKeys;

pub const LEASE_TTL_SECS: u64 = 30;
pub const LEASE_RENEW_EVERY: Duration = Duration::from_secs(10);

/// Extends the lease only while this holder still owns it.
const RENEW_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return 0
"#;

/// Deletes the lease only while this holder still owns it.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

fn cache_error(e: redis::RedisError) -> DomainError {
    DomainError::new(ErrorCode::CacheError, e.to_string())
}

#[derive(Clone)]
pub struct RedisInstanceLease {
    conn: MultiplexedConnection,
    key: String,
    holder: String,
}

impl RedisInstanceLease {
    pub fn new(conn: MultiplexedConnection, keys: &MatchKeys) -> Self {
        Self {
            conn,
            key: keys.instance(),
            holder: Uuid::new_v4().to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Takes the lease. `Ok(false)` means another server holds it.
    pub async fn acquire(&self) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&self.holder)
            .arg("NX")
            .arg("EX")
            .arg(LEASE_TTL_SECS)
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(reply.is_some())
    }

    /// Pushes the expiry out again. `Ok(false)` means the lease was lost.
    pub async fn renew(&self) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();
        let renewed: i64 = Script::new(RENEW_SCRIPT)
            .key(&self.key)
            .arg(&self.holder)
            .arg(LEASE_TTL_SECS)
            .invoke_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(renewed == 1)
    }

    pub async fn release(&self) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.holder)
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    /// Renews every `LEASE_RENEW_EVERY` until aborted or the lease is lost.
    pub fn spawn_renewal(&self) -> JoinHandle<()> {
        let lease = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LEASE_RENEW_EVERY);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match lease.renew().await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::error!(key = %lease.key, "Instance lease lost to another server");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(key = %lease.key, error = %e, "Failed to renew instance lease");
                    }
                }
            }
        })
    }
}
