//! Rate limiter adapters.
//!
//! Implementations of the RateLimiter port for different backends.
//!
//! ## Available Adapters
//!
//! - `InMemoryRateLimiter` - single process, used when no Redis is configured
//! - `RedisRateLimiter` - sorted-set sliding log shared across servers

mod config;
mod in_memory;
mod redis;

pub use config::RateLimitConfig;
pub use in_memory::InMemoryRateLimiter;
pub use self::redis::RedisRateLimiter;
