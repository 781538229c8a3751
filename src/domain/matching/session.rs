//! MatchSession aggregate.
//!
//! A session pairs exactly two distinct identities for one timed call.
//! The aggregate only enforces its own lifecycle; the guarantee that no
//! identity sits in two live sessions is kept by the matching engine.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, SessionId, StateMachine, Timestamp, UserId,
};

use super::MatchSessionStatus;

/// Minutes credited when a session has no usable timestamps.
pub const DEFAULT_BILLED_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSession {
    id: SessionId,
    participants: [UserId; 2],
    common_interests: Vec<String>,
    media_channel_id: String,
    status: MatchSessionStatus,
    created_at: Timestamp,
    started_at: Option<Timestamp>,
    ends_at: Option<Timestamp>,
    actual_ended_at: Option<Timestamp>,
}

impl MatchSession {
    /// Creates a freshly matched session.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if both participants are the same identity
    pub fn new(
        id: SessionId,
        first: UserId,
        second: UserId,
        common_interests: Vec<String>,
        media_channel_id: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if first == second {
            return Err(DomainError::validation(
                "participants",
                "A session needs two distinct participants",
            ));
        }

        Ok(Self {
            id,
            participants: [first, second],
            common_interests,
            media_channel_id: media_channel_id.into(),
            status: MatchSessionStatus::Matched,
            created_at: Timestamp::now(),
            started_at: None,
            ends_at: None,
            actual_ended_at: None,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn participants(&self) -> &[UserId; 2] {
        &self.participants
    }

    pub fn common_interests(&self) -> &[String] {
        &self.common_interests
    }

    pub fn media_channel_id(&self) -> &str {
        &self.media_channel_id
    }

    pub fn status(&self) -> MatchSessionStatus {
        self.status
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn started_at(&self) -> Option<&Timestamp> {
        self.started_at.as_ref()
    }

    pub fn ends_at(&self) -> Option<&Timestamp> {
        self.ends_at.as_ref()
    }

    pub fn actual_ended_at(&self) -> Option<&Timestamp> {
        self.actual_ended_at.as_ref()
    }

    /// Returns true if `user` is one of the two participants.
    pub fn includes(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    /// Returns the other participant, or None if `user` is not in this session.
    pub fn partner_of(&self, user: &UserId) -> Option<&UserId> {
        match &self.participants {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts the countdown: `ends_at = started_at + duration_secs`.
    pub fn activate(&mut self, now: Timestamp, duration_secs: u64) -> Result<(), DomainError> {
        self.transition(MatchSessionStatus::Active)?;
        self.started_at = Some(now);
        self.ends_at = Some(now.plus_secs(duration_secs));
        Ok(())
    }

    /// Ends the session, on timer expiry or early departure.
    pub fn complete(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.transition(MatchSessionStatus::Completed)?;
        self.actual_ended_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, target: MatchSessionStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|e| {
            DomainError::new(ErrorCode::InvalidStateTransition, e.to_string())
                .with_detail("session_id", self.id.to_string())
        })?;
        Ok(())
    }
}

/// Minutes credited to a participant's call statistics.
///
/// Rounds the real call length to the nearest minute with a floor of one;
/// falls back to `DEFAULT_BILLED_MINUTES` when either end is unknown.
pub fn billed_minutes(started_at: Option<&Timestamp>, ended_at: Option<&Timestamp>) -> i64 {
    match (started_at, ended_at) {
        (Some(start), Some(end)) => {
            let millis = end.duration_since(start).num_milliseconds();
            let minutes = (millis as f64 / 60_000.0).round() as i64;
            minutes.max(1)
        }
        _ => DEFAULT_BILLED_MINUTES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn matched_session() -> MatchSession {
        MatchSession::new(
            SessionId::new(),
            user("alice"),
            user("bob"),
            vec!["music".to_string()],
            "10mb-test",
        )
        .unwrap()
    }

    #[test]
    fn new_session_starts_matched() {
        let session = matched_session();
        assert_eq!(session.status(), MatchSessionStatus::Matched);
        assert!(session.started_at().is_none());
        assert!(session.ends_at().is_none());
        assert_eq!(session.media_channel_id(), "10mb-test");
    }

    #[test]
    fn rejects_identical_participants() {
        let result = MatchSession::new(SessionId::new(), user("a"), user("a"), vec![], "x");
        assert!(result.is_err());
    }

    #[test]
    fn partner_of_returns_the_other_side() {
        let session = matched_session();
        assert_eq!(session.partner_of(&user("alice")), Some(&user("bob")));
        assert_eq!(session.partner_of(&user("bob")), Some(&user("alice")));
        assert_eq!(session.partner_of(&user("carol")), None);
    }

    #[test]
    fn activate_sets_window() {
        let mut session = matched_session();
        let now = Timestamp::now();
        session.activate(now, 600).unwrap();

        assert_eq!(session.status(), MatchSessionStatus::Active);
        assert_eq!(session.started_at(), Some(&now));
        assert_eq!(session.ends_at(), Some(&now.plus_secs(600)));
    }

    #[test]
    fn activate_twice_fails() {
        let mut session = matched_session();
        session.activate(Timestamp::now(), 600).unwrap();
        let err = session.activate(Timestamp::now(), 600).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn complete_records_end_time() {
        let mut session = matched_session();
        session.activate(Timestamp::now(), 600).unwrap();
        let end = Timestamp::now();
        session.complete(end).unwrap();

        assert_eq!(session.status(), MatchSessionStatus::Completed);
        assert_eq!(session.actual_ended_at(), Some(&end));
    }

    #[test]
    fn complete_from_matched_is_allowed() {
        let mut session = matched_session();
        assert!(session.complete(Timestamp::now()).is_ok());
    }

    #[test]
    fn completing_twice_fails() {
        let mut session = matched_session();
        session.complete(Timestamp::now()).unwrap();
        assert!(session.complete(Timestamp::now()).is_err());
    }

    #[test]
    fn billed_minutes_rounds_and_floors() {
        let start = Timestamp::now();
        assert_eq!(billed_minutes(Some(&start), Some(&start.plus_secs(600))), 10);
        assert_eq!(billed_minutes(Some(&start), Some(&start.plus_secs(89))), 1);
        assert_eq!(billed_minutes(Some(&start), Some(&start.plus_secs(90))), 2);
        assert_eq!(billed_minutes(Some(&start), Some(&start.plus_secs(5))), 1);
    }

    #[test]
    fn billed_minutes_defaults_without_timestamps() {
        let start = Timestamp::now();
        assert_eq!(billed_minutes(None, None), DEFAULT_BILLED_MINUTES);
        assert_eq!(billed_minutes(Some(&start), None), DEFAULT_BILLED_MINUTES);
    }
}
