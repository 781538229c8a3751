//! In-process table of live sessions.
//!
//! Holds every session between creation and completion, indexed both by id
//! and by participant. Completed sessions leave the table; their history
//! lives in the `MatchStore`.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, SessionId, Timestamp, UserId};
use crate::domain::matching::MatchSession;

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, MatchSession>,
    by_user: HashMap<UserId, SessionId>,
}

#[derive(Default)]
pub struct SessionRegistry {
    tables: RwLock<Tables>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: MatchSession) {
        let mut tables = self.tables.write().await;
        for user in session.participants() {
            tables.by_user.insert(user.clone(), *session.id());
        }
        tables.sessions.insert(*session.id(), session);
    }

    pub async fn get(&self, id: &SessionId) -> Option<MatchSession> {
        self.tables.read().await.sessions.get(id).cloned()
    }

    /// The live session `user` participates in, if any.
    pub async fn session_of(&self, user: &UserId) -> Option<MatchSession> {
        let tables = self.tables.read().await;
        let id = tables.by_user.get(user)?;
        tables.sessions.get(id).cloned()
    }

    pub async fn is_live(&self, id: &SessionId) -> bool {
        self.tables.read().await.sessions.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Moves a matched session to active and returns the updated copy.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the session already ended
    /// - `InvalidStateTransition` if it is already active
    pub async fn activate(
        &self,
        id: &SessionId,
        now: Timestamp,
        duration_secs: u64,
    ) -> Result<MatchSession, DomainError> {
        let mut tables = self.tables.write().await;
        let session = tables.sessions.get_mut(id).ok_or_else(|| {
            DomainError::new(ErrorCode::SessionNotFound, "Session is not live")
                .with_detail("session_id", id.to_string())
        })?;
        session.activate(now, duration_secs)?;
        Ok(session.clone())
    }

    /// Completes and removes a session.
    ///
    /// Returns the completed session the first time; `None` once it is gone.
    pub async fn finalize(&self, id: &SessionId, now: Timestamp) -> Option<MatchSession> {
        let mut tables = self.tables.write().await;
        let mut session = tables.sessions.remove(id)?;
        for user in session.participants() {
            if tables.by_user.get(user) == Some(id) {
                tables.by_user.remove(user);
            }
        }
        // Only matched/active sessions are ever stored, so this cannot fail.
        if let Err(e) = session.complete(now) {
            tracing::warn!(session_id = %id, error = %e, "Completing a stored session failed");
        }
        Some(session)
    }
}
