//! RateSessionHandler - Command handler for post-call ratings.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, SessionId, UserId};
use crate::domain::matching::{billed_minutes, Rating};
use crate::ports::MatchStore;

/// Command to rate a finished call.
#[derive(Debug, Clone)]
pub struct RateSessionCommand {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub rating: Rating,
}

/// Result of a stored rating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSessionResult {
    /// Minutes credited to the rater, or `None` if stats were not updated.
    pub credited_minutes: Option<i64>,
}

/// Handler for rating sessions.
///
/// Storing the rating is the contract; crediting call statistics is best
/// effort and never fails the command.
pub struct RateSessionHandler {
    store: Arc<dyn MatchStore>,
}

impl RateSessionHandler {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, cmd: RateSessionCommand) -> Result<RateSessionResult, DomainError> {
        // 1. Store the rating (participation is checked by the store)
        self.store
            .rate_participant(&cmd.session_id, &cmd.user_id, cmd.rating)
            .await?;

        // 2. Credit one call and its length to the rater
        let credited_minutes = self.credit_call(&cmd).await;

        tracing::info!(
            session_id = %cmd.session_id,
            user_id = %cmd.user_id,
            rating = %cmd.rating,
            "Session rated"
        );
        Ok(RateSessionResult { credited_minutes })
    }

    async fn credit_call(&self, cmd: &RateSessionCommand) -> Option<i64> {
        let record = match self.store.get_session(&cmd.session_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(session_id = %cmd.session_id, error = %e, "Session lookup failed, stats skipped");
                return None;
            }
        };

        let minutes = billed_minutes(record.started_at.as_ref(), record.actual_ended_at.as_ref());
        match self.store.update_user_stats(&cmd.user_id, 1, minutes).await {
            Ok(()) => Some(minutes),
            Err(e) => {
                tracing::warn!(user_id = %cmd.user_id, error = %e, "Failed to update call stats");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::InMemoryMatchStore;
    use crate::domain::foundation::{ErrorCode, Timestamp};
    use crate::domain::matching::MatchSession;
    use crate::ports::{SessionUpdate, UserProfile};

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    async fn store_with_session(minutes: Option<u64>) -> (Arc<InMemoryMatchStore>, SessionId) {
        let store = Arc::new(InMemoryMatchStore::new());
        store.insert_profile(user("alice"), UserProfile::default()).await;
        store.insert_profile(user("bob"), UserProfile::default()).await;

        let session =
            MatchSession::new(SessionId::new(), user("alice"), user("bob"), vec![], "10mb-x")
                .unwrap();
        store.create_session(&session).await.unwrap();
        store.add_participant(session.id(), &user("alice")).await.unwrap();
        store.add_participant(session.id(), &user("bob")).await.unwrap();

        if let Some(minutes) = minutes {
            let started = Timestamp::now();
            let ended = started.plus_secs(minutes * 60);
            store
                .update_session(session.id(), SessionUpdate::activated(started, started.plus_secs(600)))
                .await
                .unwrap();
            store
                .update_session(session.id(), SessionUpdate::completed(ended))
                .await
                .unwrap();
        }
        (store, *session.id())
    }

    #[tokio::test]
    async fn rating_credits_real_call_length() {
        let (store, id) = store_with_session(Some(4)).await;
        let handler = RateSessionHandler::new(store.clone());

        let result = handler
            .handle(RateSessionCommand {
                session_id: id,
                user_id: user("alice"),
                rating: Rating::Good,
            })
            .await
            .unwrap();

        assert_eq!(result.credited_minutes, Some(4));
        assert_eq!(store.rating_of(&id, &user("alice")).await, Some(Rating::Good));
        let profile = store.get_profile(&user("alice")).await.unwrap().unwrap();
        assert_eq!(profile.total_calls, 1);
        assert_eq!(profile.total_minutes, 4);
    }

    #[tokio::test]
    async fn unfinished_session_bills_default_minutes() {
        let (store, id) = store_with_session(None).await;
        let handler = RateSessionHandler::new(store.clone());

        let result = handler
            .handle(RateSessionCommand {
                session_id: id,
                user_id: user("bob"),
                rating: Rating::Neutral,
            })
            .await
            .unwrap();

        assert_eq!(result.credited_minutes, Some(10));
    }

    #[tokio::test]
    async fn outsiders_cannot_rate() {
        let (store, id) = store_with_session(Some(2)).await;
        let handler = RateSessionHandler::new(store.clone());

        let err = handler
            .handle(RateSessionCommand {
                session_id: id,
                user_id: user("mallory"),
                rating: Rating::Good,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::NotParticipant);
    }

    #[tokio::test]
    async fn missing_profile_does_not_fail_rating() {
        let (store, id) = store_with_session(Some(2)).await;
        let session = store.get_session(&id).await.unwrap().unwrap();
        assert!(session.actual_ended_at.is_some());

        // A participant row without a user profile.
        store.add_participant(&id, &user("carol")).await.unwrap();
        let handler = RateSessionHandler::new(store.clone());

        let result = handler
            .handle(RateSessionCommand {
                session_id: id,
                user_id: user("carol"),
                rating: Rating::Good,
            })
            .await
            .unwrap();
        assert_eq!(result.credited_minutes, None);
        assert_eq!(store.rating_of(&id, &user("carol")).await, Some(Rating::Good));
    }
}
