//! Adapters - Implementations of port interfaces and transports.
//!
//! - `auth` - `IdentityVerifier` (JWT, mock)
//! - `matching` - `WaitingQueue` / `ActiveFlags` (in-memory, Redis)
//! - `rate_limiter` - `RateLimiter` (in-memory, Redis)
//! - `persistence` - `MatchStore` (in-memory, PostgreSQL)
//! - `http` - REST endpoints and router assembly
//! - `websocket` - matchmaking protocol over websockets

pub mod auth;
pub mod http;
pub mod matching;
pub mod persistence;
pub mod rate_limiter;
pub mod websocket;
