//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, authentication and error types used by every
//! other layer of the matchmaking service.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ConnectionId, SessionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
