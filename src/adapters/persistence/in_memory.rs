//! In-memory MatchStore for tests and storage-less deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, SessionId, UserId};
use crate::domain::matching::{MatchSession, Rating};
use crate::ports::{MatchStore, SessionRecord, SessionUpdate, UserProfile};

#[derive(Debug, Default)]
struct StoreState {
    sessions: HashMap<SessionId, SessionRecord>,
    participants: HashMap<(SessionId, UserId), Option<Rating>>,
    users: HashMap<UserId, UserProfile>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryMatchStore {
    state: Arc<RwLock<StoreState>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user profile.
    pub async fn insert_profile(&self, user: UserId, profile: UserProfile) {
        self.state.write().await.users.insert(user, profile);
    }

    /// Makes every subsequent call fail with `DatabaseError`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Rating stored for a participant, if any.
    pub async fn rating_of(&self, id: &SessionId, user: &UserId) -> Option<Rating> {
        self.state
            .read()
            .await
            .participants
            .get(&(*id, user.clone()))
            .copied()
            .flatten()
    }

    /// Participants recorded for a session.
    pub async fn participants_of(&self, id: &SessionId) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .state
            .read()
            .await
            .participants
            .keys()
            .filter(|(sid, _)| sid == id)
            .map(|(_, user)| user.clone())
            .collect();
        users.sort();
        users
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Store unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn create_session(&self, session: &MatchSession) -> Result<(), DomainError> {
        self.check_available()?;
        self.state
            .write()
            .await
            .sessions
            .insert(*session.id(), SessionRecord::from(session));
        Ok(())
    }

    async fn update_session(
        &self,
        id: &SessionId,
        update: SessionUpdate,
    ) -> Result<(), DomainError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let record = state.sessions.get_mut(id).ok_or_else(|| {
            DomainError::new(ErrorCode::SessionNotFound, format!("Session not found: {}", id))
        })?;

        if let Some(status) = update.status {
            record.status = status;
        }
        if update.started_at.is_some() {
            record.started_at = update.started_at;
        }
        if update.ends_at.is_some() {
            record.ends_at = update.ends_at;
        }
        if update.actual_ended_at.is_some() {
            record.actual_ended_at = update.actual_ended_at;
        }
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, DomainError> {
        self.check_available()?;
        Ok(self.state.read().await.sessions.get(id).cloned())
    }

    async fn add_participant(&self, id: &SessionId, user: &UserId) -> Result<(), DomainError> {
        self.check_available()?;
        self.state
            .write()
            .await
            .participants
            .entry((*id, user.clone()))
            .or_insert(None);
        Ok(())
    }

    async fn rate_participant(
        &self,
        id: &SessionId,
        user: &UserId,
        rating: Rating,
    ) -> Result<(), DomainError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match state.participants.get_mut(&(*id, user.clone())) {
            Some(slot) => {
                *slot = Some(rating);
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::NotParticipant,
                format!("User {} did not take part in session {}", user, id),
            )),
        }
    }

    async fn set_online(&self, user: &UserId, online: bool) -> Result<(), DomainError> {
        self.check_available()?;
        self.state
            .write()
            .await
            .users
            .entry(user.clone())
            .or_default()
            .is_online = online;
        Ok(())
    }

    async fn get_profile(&self, user: &UserId) -> Result<Option<UserProfile>, DomainError> {
        self.check_available()?;
        Ok(self.state.read().await.users.get(user).cloned())
    }

    async fn update_user_stats(
        &self,
        user: &UserId,
        calls: i64,
        minutes: i64,
    ) -> Result<(), DomainError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let profile = state.users.get_mut(user).ok_or_else(|| {
            DomainError::new(ErrorCode::UserNotFound, format!("User not found: {}", user))
        })?;
        profile.total_calls += calls;
        profile.total_minutes += minutes;
        Ok(())
    }

    async fn online_count(&self) -> Result<u64, DomainError> {
        self.check_available()?;
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .filter(|p| p.is_online)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::matching::MatchSessionStatus;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn session() -> MatchSession {
        MatchSession::new(
            SessionId::new(),
            user("a"),
            user("b"),
            vec!["music".into()],
            "10mb-1",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn session_lifecycle_updates_apply() {
        let store = InMemoryMatchStore::new();
        let session = session();
        store.create_session(&session).await.unwrap();

        let start = Timestamp::now();
        store
            .update_session(session.id(), SessionUpdate::activated(start, start.plus_secs(600)))
            .await
            .unwrap();
        let end = start.plus_secs(30);
        store
            .update_session(session.id(), SessionUpdate::completed(end))
            .await
            .unwrap();

        let record = store.get_session(session.id()).await.unwrap().unwrap();
        assert_eq!(record.status, MatchSessionStatus::Completed);
        assert_eq!(record.started_at, Some(start));
        assert_eq!(record.actual_ended_at, Some(end));
    }

    #[tokio::test]
    async fn update_of_unknown_session_fails() {
        let store = InMemoryMatchStore::new();
        let err = store
            .update_session(&SessionId::new(), SessionUpdate::completed(Timestamp::now()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionNotFound);
    }

    #[tokio::test]
    async fn rating_requires_participation() {
        let store = InMemoryMatchStore::new();
        let session = session();
        store.create_session(&session).await.unwrap();
        store.add_participant(session.id(), &user("a")).await.unwrap();

        store
            .rate_participant(session.id(), &user("a"), Rating::Good)
            .await
            .unwrap();
        assert_eq!(store.rating_of(session.id(), &user("a")).await, Some(Rating::Good));

        let err = store
            .rate_participant(session.id(), &user("z"), Rating::Good)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotParticipant);
    }

    #[tokio::test]
    async fn online_count_tracks_presence() {
        let store = InMemoryMatchStore::new();
        store.set_online(&user("a"), true).await.unwrap();
        store.set_online(&user("b"), true).await.unwrap();
        store.set_online(&user("a"), false).await.unwrap();
        assert_eq!(store.online_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stats_accumulate() {
        let store = InMemoryMatchStore::new();
        store.insert_profile(user("a"), UserProfile::default()).await;
        store.update_user_stats(&user("a"), 1, 10).await.unwrap();
        store.update_user_stats(&user("a"), 1, 3).await.unwrap();

        let profile = store.get_profile(&user("a")).await.unwrap().unwrap();
        assert_eq!(profile.total_calls, 2);
        assert_eq!(profile.total_minutes, 13);
    }

    #[tokio::test]
    async fn failing_store_rejects_everything() {
        let store = InMemoryMatchStore::new();
        store.set_failing(true);
        assert!(store.online_count().await.is_err());
        assert!(store.create_session(&session()).await.is_err());
    }
}
