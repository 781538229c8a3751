//! Waiting queue and active-flag adapters.
//!
//! - `InMemoryWaitingQueue` / `InMemoryActiveFlags` - default, single process
//! - `RedisWaitingQueue` / `RedisActiveFlags` - state survives restarts and is
//!   visible to other servers; TTLs bound how long stale entries linger
//! - `RedisInstanceLease` - keeps a second server off the same key prefix

mod in_memory;
mod keys;
mod lease;
mod redis;

pub use in_memory::{InMemoryActiveFlags, InMemoryWaitingQueue};
pub use keys::MatchKeys;
pub use lease::RedisInstanceLease;
pub use self::redis::{RedisActiveFlags, RedisWaitingQueue};
