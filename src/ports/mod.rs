//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the matchmaking core and the outside world. Adapters implement these ports.
//!
//! - `IdentityVerifier` - credential → identity
//! - `MatchStore` - durable sessions, participants, profiles, stats
//! - `WaitingQueue` / `ActiveFlags` - pairing state with pluggable backends
//! - `RateLimiter` - per-identity sliding-window throttle

mod identity_verifier;
mod match_store;
mod rate_limiter;
mod waiting_queue;

pub use identity_verifier::IdentityVerifier;
pub use match_store::{MatchStore, SessionRecord, SessionUpdate, UserProfile};
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
    MATCH_START_RESOURCE,
};
pub use waiting_queue::{ActiveFlags, WaitingQueue};
