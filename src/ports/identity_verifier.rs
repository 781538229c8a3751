//! Identity verification port.
//!
//! Turns an opaque client credential into an `AuthenticatedUser`. The
//! matchmaking core never issues credentials, it only checks them.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Verifies a bearer credential and extracts the identity.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidToken` for malformed or badly signed tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `credential` (without any "Bearer " prefix).
    async fn verify(&self, credential: &str) -> Result<AuthenticatedUser, AuthError>;
}
