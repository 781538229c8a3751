//! Mock identity verifier for tests and local development.
//!
//! # Example
//!
//! ```ignore
//! let verifier = MockIdentityVerifier::new()
//!     .with_test_user("token-alice", "alice")
//!     .with_test_user("token-bob", "bob");
//!
//! let user = verifier.verify("token-alice").await?;
//! assert_eq!(user.id.as_str(), "alice");
//! ```

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::IdentityVerifier;

/// Accepts a fixed set of tokens. Anything else is `InvalidToken`.
#[derive(Debug, Default, Clone)]
pub struct MockIdentityVerifier {
    tokens: HashMap<String, AuthenticatedUser>,
    force_error: Option<AuthError>,
}

impl MockIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valid token that maps to a user.
    pub fn with_user(mut self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }

    /// Adds a valid token for a user with the given id.
    ///
    /// Ids that fail validation are skipped, leaving the token invalid.
    pub fn with_test_user(self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        match UserId::new(user_id.as_str()) {
            Ok(id) => {
                let email = Some(format!("{}@test.example.com", user_id));
                self.with_user(token, AuthenticatedUser::new(id, email))
            }
            Err(_) => self,
        }
    }

    /// Forces all verifications to return the specified error.
    pub fn with_error(mut self, error: AuthError) -> Self {
        self.force_error = Some(error);
        self
    }

    /// Returns the number of registered valid tokens.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

#[async_trait]
impl IdentityVerifier for MockIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<AuthenticatedUser, AuthError> {
        if let Some(error) = &self.force_error {
            return Err(error.clone());
        }
        if credential.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        self.tokens
            .get(credential)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
