//! Redis-backed waiting queue and active flags.
//!
//! The queue is a sorted set of identities scored by a monotonically
//! increasing sequence, so `ZRANGE 0 -1` yields enqueue order. Entry payloads
//! live in separate keys with a TTL; an identity whose payload expired is
//! treated as gone and pruned lazily on the next scan.
//!
//! Claiming a pair runs as one Lua script, so servers sharing this Redis
//! cannot hand the same waiter to two sessions.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::matching::WaitingEntry;
use crate::ports::{ActiveFlags, WaitingQueue};

use super::keys::MatchKeys;

/// Sets both flags only if neither exists. Returns 1 when claimed, else 0.
const CLAIM_PAIR_SCRIPT: &str = r#"
if KEYS[1] == KEYS[2] then
  return 0
end
if redis.call('EXISTS', KEYS[1]) == 1 or redis.call('EXISTS', KEYS[2]) == 1 then
  return 0
end
redis.call('SET', KEYS[1], '1', 'EX', ARGV[1])
redis.call('SET', KEYS[2], '1', 'EX', ARGV[1])
return 1
"#;

fn cache_error(e: redis::RedisError) -> DomainError {
    DomainError::new(ErrorCode::CacheError, e.to_string())
}

#[derive(Clone)]
pub struct RedisWaitingQueue {
    conn: MultiplexedConnection,
    keys: MatchKeys,
    entry_ttl_secs: u64,
}

impl RedisWaitingQueue {
    pub fn new(conn: MultiplexedConnection, keys: MatchKeys, entry_ttl_secs: u64) -> Self {
        Self {
            conn,
            keys,
            entry_ttl_secs,
        }
    }
}

#[async_trait]
impl WaitingQueue for RedisWaitingQueue {
    async fn upsert(&self, entry: WaitingEntry) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(&entry)
            .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;

        let seq: i64 = redis::cmd("INCR")
            .arg(self.keys.queue_seq())
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;

        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(self.keys.queue())
            .arg(seq)
            .arg(entry.user_id.as_str())
            .ignore()
            .cmd("SET")
            .arg(self.keys.entry(&entry.user_id))
            .arg(payload)
            .arg("EX")
            .arg(self.entry_ttl_secs)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    async fn remove(&self, user: &UserId) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();
        let (removed, _): (i64, i64) = redis::pipe()
            .atomic()
            .cmd("ZREM")
            .arg(self.keys.queue())
            .arg(user.as_str())
            .cmd("DEL")
            .arg(self.keys.entry(user))
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(removed > 0)
    }

    async fn remove_pair(&self, a: &UserId, b: &UserId) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .cmd("ZREM")
            .arg(self.keys.queue())
            .arg(a.as_str())
            .arg(b.as_str())
            .ignore()
            .cmd("DEL")
            .arg(self.keys.entry(a))
            .arg(self.keys.entry(b))
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(cache_error)
    }

    async fn entries(&self) -> Result<Vec<WaitingEntry>, DomainError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("ZRANGE")
            .arg(self.keys.queue())
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;

        if members.is_empty() {
            return Ok(Vec::new());
        }

        let users: Vec<UserId> = members
            .iter()
            .filter_map(|m| UserId::new(m.as_str()).ok())
            .collect();
        let entry_keys: Vec<String> = users.iter().map(|u| self.keys.entry(u)).collect();

        let payloads: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&entry_keys)
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;

        let mut entries = Vec::with_capacity(users.len());
        let mut expired = Vec::new();
        for (user, payload) in users.into_iter().zip(payloads) {
            match payload.and_then(|p| serde_json::from_str::<WaitingEntry>(&p).ok()) {
                Some(entry) => entries.push(entry),
                None => expired.push(user),
            }
        }

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "Pruning expired queue entries");
            let mut cmd = redis::cmd("ZREM");
            cmd.arg(self.keys.queue());
            for user in &expired {
                cmd.arg(user.as_str());
            }
            cmd.query_async::<_, ()>(&mut conn)
                .await
                .map_err(cache_error)?;
        }

        Ok(entries)
    }

    async fn contains(&self, user: &UserId) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = redis::cmd("ZSCORE")
            .arg(self.keys.queue())
            .arg(user.as_str())
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(score.is_some())
    }

    async fn len(&self) -> Result<usize, DomainError> {
        let mut conn = self.conn.clone();
        let count: usize = redis::cmd("ZCARD")
            .arg(self.keys.queue())
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(count)
    }
}

#[derive(Clone)]
pub struct RedisActiveFlags {
    conn: MultiplexedConnection,
    keys: MatchKeys,
    ttl_secs: u64,
    claim: Arc<Script>,
}

impl RedisActiveFlags {
    pub fn new(conn: MultiplexedConnection, keys: MatchKeys, ttl_secs: u64) -> Self {
        Self {
            conn,
            keys,
            ttl_secs,
            claim: Arc::new(Script::new(CLAIM_PAIR_SCRIPT)),
        }
    }
}

#[async_trait]
impl ActiveFlags for RedisActiveFlags {
    async fn is_active(&self, user: &UserId) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();
        let exists: i64 = redis::cmd("EXISTS")
            .arg(self.keys.active(user))
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(exists > 0)
    }

    async fn claim_pair(&self, a: &UserId, b: &UserId) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();
        let claimed: i64 = self
            .claim
            .key(self.keys.active(a))
            .key(self.keys.active(b))
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(claimed == 1)
    }

    async fn clear_active(&self, user: &UserId) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::cmd("DEL")
            .arg(self.keys.active(user))
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(deleted > 0)
    }
}
