//! Persistence port for sessions, participants and user profiles.
//!
//! The matchmaking core treats every call here as best-effort. Matching
//! decisions are made on in-memory state and never wait on the store.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SessionId, Timestamp, UserId};
use crate::domain::matching::{MatchSession, MatchSessionStatus, Rating};

/// Partial update applied to a stored session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub status: Option<MatchSessionStatus>,
    pub started_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub actual_ended_at: Option<Timestamp>,
}

impl SessionUpdate {
    /// Update written when the countdown starts.
    pub fn activated(started_at: Timestamp, ends_at: Timestamp) -> Self {
        Self {
            status: Some(MatchSessionStatus::Active),
            started_at: Some(started_at),
            ends_at: Some(ends_at),
            actual_ended_at: None,
        }
    }

    /// Update written when the session ends for any reason.
    pub fn completed(actual_ended_at: Timestamp) -> Self {
        Self {
            status: Some(MatchSessionStatus::Completed),
            actual_ended_at: Some(actual_ended_at),
            ..Self::default()
        }
    }
}

/// Stored view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub status: MatchSessionStatus,
    pub common_interests: Vec<String>,
    pub media_channel_id: String,
    pub started_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub actual_ended_at: Option<Timestamp>,
}

impl From<&MatchSession> for SessionRecord {
    fn from(session: &MatchSession) -> Self {
        Self {
            id: *session.id(),
            status: session.status(),
            common_interests: session.common_interests().to_vec(),
            media_channel_id: session.media_channel_id().to_string(),
            started_at: session.started_at().copied(),
            ends_at: session.ends_at().copied(),
            actual_ended_at: session.actual_ended_at().copied(),
        }
    }
}

/// Profile fields the matchmaking core reads or updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub nickname: Option<String>,
    pub interests: Vec<String>,
    pub total_calls: i64,
    pub total_minutes: i64,
    pub is_online: bool,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Persists a newly matched session under its engine-generated id.
    async fn create_session(&self, session: &MatchSession) -> Result<(), DomainError>;

    /// # Errors
    ///
    /// - `SessionNotFound` if the session was never created
    async fn update_session(
        &self,
        id: &SessionId,
        update: SessionUpdate,
    ) -> Result<(), DomainError>;

    async fn get_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, DomainError>;

    async fn add_participant(&self, id: &SessionId, user: &UserId) -> Result<(), DomainError>;

    /// Stores the rating `user` gave in session `id`.
    ///
    /// # Errors
    ///
    /// - `NotParticipant` if `user` was not part of the session
    async fn rate_participant(
        &self,
        id: &SessionId,
        user: &UserId,
        rating: Rating,
    ) -> Result<(), DomainError>;

    async fn set_online(&self, user: &UserId, online: bool) -> Result<(), DomainError>;

    async fn get_profile(&self, user: &UserId) -> Result<Option<UserProfile>, DomainError>;

    /// Adds to the user's running call statistics.
    async fn update_user_stats(
        &self,
        user: &UserId,
        calls: i64,
        minutes: i64,
    ) -> Result<(), DomainError>;

    /// Number of users currently flagged online.
    async fn online_count(&self) -> Result<u64, DomainError>;
}
