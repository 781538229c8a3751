//! Matchmaking outcomes and failures.

use thiserror::Error;

use crate::domain::foundation::AuthError;

use super::{MatchSession, WaitingEntry};

/// Result of a successful `request_match` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A partner was found and a session created.
    Matched {
        session: MatchSession,
        /// The partner's queue entry as it was when picked.
        partner: WaitingEntry,
        common_interests: Vec<String>,
    },
    /// No compatible partner yet; the requester is waiting.
    Enqueued,
}

/// Everything that can go wrong on the matchmaking path.
///
/// None of these are fatal; each ends up as a log line and, where a
/// client is involved, a `match:error` notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The requester is already in a live session.
    #[error("Already in a match")]
    AlreadyActive,

    #[error("Too many requests. Please wait a moment and try again.")]
    Throttled,

    #[error("Authentication failed: {0}")]
    Unauthenticated(#[from] AuthError),

    /// The connection was never registered or has gone away.
    #[error("Connection is not registered")]
    NotConnected,

    /// Queue or flag storage failed; nothing was changed.
    #[error("Matching backend failure: {0}")]
    Backend(String),
}

impl MatchError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Text sent to the client in `match:error`.
    pub fn client_message(&self) -> String {
        match self {
            MatchError::Backend(_) => "Failed to start matching".to_string(),
            MatchError::Unauthenticated(AuthError::MissingCredential) => {
                "Authentication token is missing".to_string()
            }
            MatchError::Unauthenticated(_) => "Authentication failed".to_string(),
            other => other.to_string(),
        }
    }
}
