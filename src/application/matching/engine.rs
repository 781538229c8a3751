//! MatchingEngine - interest-based partner selection.
//!
//! Every mutation of the waiting queue, the active flags and the session
//! registry goes through one async gate, so two concurrent requests can
//! never pick the same partner and an identity is never in two live
//! sessions. Persistence jobs for a session are queued under the same gate,
//! so they reach the store in lifecycle order.
//!
//! ## Selection
//!
//! 1. Reject the requester if already flagged active.
//! 2. Scan waiting entries oldest first, skipping the requester and anyone
//!    flagged active, scoring by the number of shared interests.
//! 3. The highest score of at least one wins; ties go to the earliest
//!    enqueued candidate.
//! 4. No winner: upsert the requester's entry (a repeat request re-stamps it).
//! 5. Winner: claim both flags in one backend call, then drop both queue
//!    entries in one call. If the drop fails the claim is released, so a
//!    backend error leaves queue and flags as they were.
//!
//! A claim lost to another server sharing the backend moves on to the next
//! best candidate.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, SessionId, Timestamp, UserId};
use crate::domain::matching::{
    InterestSet, MatchError, MatchOutcome, MatchSession, WaitingEntry,
};
use crate::ports::{ActiveFlags, WaitingQueue};

use super::{PersistenceWriter, SessionRegistry};

pub struct MatchingEngine {
    queue: Arc<dyn WaitingQueue>,
    flags: Arc<dyn ActiveFlags>,
    sessions: Arc<SessionRegistry>,
    writer: PersistenceWriter,
    media_channel_prefix: String,
    gate: Mutex<()>,
}

impl MatchingEngine {
    pub fn new(
        queue: Arc<dyn WaitingQueue>,
        flags: Arc<dyn ActiveFlags>,
        sessions: Arc<SessionRegistry>,
        writer: PersistenceWriter,
        media_channel_prefix: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            flags,
            sessions,
            writer,
            media_channel_prefix: media_channel_prefix.into(),
            gate: Mutex::new(()),
        }
    }

    /// Tries to pair `user` with the best waiting partner.
    ///
    /// # Errors
    ///
    /// - `AlreadyActive` if `user` is in a live session
    /// - `Backend` if queue or flag storage fails; nothing was changed
    pub async fn request_match(
        &self,
        user: &UserId,
        interests: InterestSet,
    ) -> Result<MatchOutcome, MatchError> {
        let _gate = self.gate.lock().await;

        if self.flags.is_active(user).await.map_err(backend)? {
            return Err(MatchError::AlreadyActive);
        }

        let entry = WaitingEntry::new(user.clone(), interests);
        let mut lost = HashSet::new();

        loop {
            let Some((partner, common_interests)) = self.best_partner(&entry, &lost).await? else {
                self.queue.upsert(entry).await.map_err(backend)?;
                tracing::debug!(user_id = %user, "No compatible partner, waiting");
                return Ok(MatchOutcome::Enqueued);
            };

            let id = SessionId::new();
            let session = MatchSession::new(
                id,
                user.clone(),
                partner.user_id.clone(),
                common_interests.clone(),
                format!("{}-{}", self.media_channel_prefix, id),
            )
            .map_err(backend)?;

            if !self.claim(user, &partner.user_id).await? {
                if self.flags.is_active(user).await.map_err(backend)? {
                    return Err(MatchError::AlreadyActive);
                }
                tracing::debug!(partner_id = %partner.user_id, "Partner claimed elsewhere");
                lost.insert(partner.user_id);
                continue;
            }

            self.sessions.insert(session.clone()).await;
            self.writer.session_created(&session);

            tracing::info!(
                session_id = %id,
                user_id = %user,
                partner_id = %partner.user_id,
                shared = common_interests.len(),
                "Match found"
            );

            return Ok(MatchOutcome::Matched {
                session,
                partner,
                common_interests,
            });
        }
    }

    /// Takes both identities out of matching. All or nothing.
    async fn claim(&self, user: &UserId, partner: &UserId) -> Result<bool, MatchError> {
        if !self.flags.claim_pair(user, partner).await.map_err(backend)? {
            return Ok(false);
        }

        if let Err(e) = self.queue.remove_pair(user, partner).await {
            for id in [user, partner] {
                if let Err(release) = self.flags.clear_active(id).await {
                    tracing::error!(
                        user_id = %id,
                        error = %release,
                        "Failed to release claim, flag left to expire"
                    );
                }
            }
            return Err(backend(e));
        }
        Ok(true)
    }

    async fn best_partner(
        &self,
        requester: &WaitingEntry,
        lost: &HashSet<UserId>,
    ) -> Result<Option<(WaitingEntry, Vec<String>)>, MatchError> {
        let mut best: Option<(WaitingEntry, Vec<String>)> = None;

        for candidate in self.queue.entries().await.map_err(backend)? {
            if candidate.user_id == requester.user_id || lost.contains(&candidate.user_id) {
                continue;
            }
            if self.flags.is_active(&candidate.user_id).await.map_err(backend)? {
                continue;
            }

            let common = requester.interests.overlap(&candidate.interests);
            let best_score = best.as_ref().map_or(0, |(_, c)| c.len());
            // Strictly greater keeps the earliest candidate on ties.
            if common.len() > best_score {
                best = Some((candidate, common));
            }
        }

        Ok(best)
    }

    /// Withdraws `user` from the queue. Safe to call when not waiting.
    ///
    /// Returns whether an entry was removed.
    pub async fn cancel(&self, user: &UserId) -> Result<bool, MatchError> {
        let _gate = self.gate.lock().await;
        let removed = self.queue.remove(user).await.map_err(backend)?;
        if removed {
            tracing::debug!(user_id = %user, "Left the waiting queue");
        }
        Ok(removed)
    }

    /// Starts the countdown window of a freshly matched session.
    pub async fn activate(
        &self,
        id: &SessionId,
        duration_secs: u64,
    ) -> Result<MatchSession, DomainError> {
        let _gate = self.gate.lock().await;
        let session = self
            .sessions
            .activate(id, Timestamp::now(), duration_secs)
            .await?;
        self.writer.session_activated(&session);
        Ok(session)
    }

    /// Ends a live session and releases both participants.
    ///
    /// Idempotent: only the first call for a session returns it; later
    /// calls return `None` and touch nothing. A flag that fails to clear is
    /// logged and left to expire on its TTL.
    pub async fn end_session(&self, id: &SessionId) -> Option<MatchSession> {
        let _gate = self.gate.lock().await;
        self.finalize(id).await
    }

    /// Ends whatever live session `user` is in.
    pub async fn end_session_of(&self, user: &UserId) -> Option<MatchSession> {
        let _gate = self.gate.lock().await;
        let session = self.sessions.session_of(user).await?;
        self.finalize(session.id()).await
    }

    async fn finalize(&self, id: &SessionId) -> Option<MatchSession> {
        let session = self.sessions.finalize(id, Timestamp::now()).await?;
        self.writer.session_completed(&session);

        for user in session.participants() {
            if let Err(e) = self.flags.clear_active(user).await {
                tracing::warn!(user_id = %user, error = %e, "Failed to clear active flag");
            }
        }

        tracing::info!(session_id = %id, "Session ended");
        Some(session)
    }

    pub async fn session_of(&self, user: &UserId) -> Option<MatchSession> {
        self.sessions.session_of(user).await
    }

    pub async fn is_live(&self, id: &SessionId) -> bool {
        self.sessions.is_live(id).await
    }

    pub async fn waiting_count(&self) -> Result<usize, MatchError> {
        self.queue.len().await.map_err(backend)
    }

    pub async fn is_waiting(&self, user: &UserId) -> Result<bool, MatchError> {
        self.queue.contains(user).await.map_err(backend)
    }

    pub async fn is_active(&self, user: &UserId) -> Result<bool, MatchError> {
        self.flags.is_active(user).await.map_err(backend)
    }
}

fn backend(e: DomainError) -> MatchError {
    MatchError::backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::matching::{InMemoryActiveFlags, InMemoryWaitingQueue};
    use crate::adapters::persistence::InMemoryMatchStore;
    use crate::domain::foundation::ErrorCode;
    use crate::domain::matching::MatchSessionStatus;
    use crate::ports::MatchStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn interests(tags: &[&str]) -> InterestSet {
        InterestSet::from_raw(tags.iter().copied())
    }

    fn engine_with(queue: Arc<dyn WaitingQueue>, flags: Arc<dyn ActiveFlags>) -> MatchingEngine {
        let writer = PersistenceWriter::spawn(Arc::new(InMemoryMatchStore::new()));
        MatchingEngine::new(queue, flags, Arc::new(SessionRegistry::new()), writer, "10mb")
    }

    fn engine() -> MatchingEngine {
        engine_with(
            Arc::new(InMemoryWaitingQueue::new()),
            Arc::new(InMemoryActiveFlags::new()),
        )
    }

    /// Queue whose pair removal can be made to fail.
    #[derive(Default)]
    struct DropFailingQueue {
        inner: InMemoryWaitingQueue,
        fail_drop: AtomicBool,
    }

    #[async_trait]
    impl WaitingQueue for DropFailingQueue {
        async fn upsert(&self, entry: WaitingEntry) -> Result<(), DomainError> {
            self.inner.upsert(entry).await
        }

        async fn remove(&self, user: &UserId) -> Result<bool, DomainError> {
            self.inner.remove(user).await
        }

        async fn remove_pair(&self, a: &UserId, b: &UserId) -> Result<(), DomainError> {
            if self.fail_drop.load(Ordering::SeqCst) {
                return Err(DomainError::new(ErrorCode::CacheError, "connection reset"));
            }
            self.inner.remove_pair(a, b).await
        }

        async fn entries(&self) -> Result<Vec<WaitingEntry>, DomainError> {
            self.inner.entries().await
        }

        async fn contains(&self, user: &UserId) -> Result<bool, DomainError> {
            self.inner.contains(user).await
        }

        async fn len(&self) -> Result<usize, DomainError> {
            self.inner.len().await
        }
    }

    /// Flags where another server takes `contested` just before our claim.
    struct ContestedFlags {
        inner: InMemoryActiveFlags,
        contested: UserId,
    }

    #[async_trait]
    impl ActiveFlags for ContestedFlags {
        async fn is_active(&self, user: &UserId) -> Result<bool, DomainError> {
            self.inner.is_active(user).await
        }

        async fn claim_pair(&self, a: &UserId, b: &UserId) -> Result<bool, DomainError> {
            if b == &self.contested {
                self.inner.claim_pair(b, &user("elsewhere")).await?;
            }
            self.inner.claim_pair(a, b).await
        }

        async fn clear_active(&self, user: &UserId) -> Result<bool, DomainError> {
            self.inner.clear_active(user).await
        }
    }

    fn matched(outcome: MatchOutcome) -> (MatchSession, WaitingEntry, Vec<String>) {
        match outcome {
            MatchOutcome::Matched {
                session,
                partner,
                common_interests,
            } => (session, partner, common_interests),
            MatchOutcome::Enqueued => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn first_requester_waits() {
        let engine = engine();
        let outcome = engine
            .request_match(&user("a"), interests(&["music"]))
            .await
            .unwrap();

        assert_eq!(outcome, MatchOutcome::Enqueued);
        assert_eq!(engine.waiting_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn shared_interest_produces_a_session() {
        let engine = engine();
        engine
            .request_match(&user("a"), interests(&["music", "games"]))
            .await
            .unwrap();

        let (session, partner, common) = matched(
            engine
                .request_match(&user("b"), interests(&["games", "music"]))
                .await
                .unwrap(),
        );

        assert_eq!(partner.user_id, user("a"));
        // Requester's order.
        assert_eq!(common, vec!["games".to_string(), "music".to_string()]);
        assert_eq!(session.participants(), &[user("b"), user("a")]);
        assert_eq!(session.status(), MatchSessionStatus::Matched);
        assert_eq!(
            session.media_channel_id(),
            format!("10mb-{}", session.id())
        );
        assert_eq!(engine.waiting_count().await.unwrap(), 0);
        assert!(engine.is_active(&user("a")).await.unwrap());
        assert!(engine.is_active(&user("b")).await.unwrap());
    }

    #[tokio::test]
    async fn disjoint_interests_never_match() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["music"])).await.unwrap();
        let outcome = engine
            .request_match(&user("b"), interests(&["sports"]))
            .await
            .unwrap();

        assert_eq!(outcome, MatchOutcome::Enqueued);
        assert_eq!(engine.waiting_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_interests_wait_forever() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["music"])).await.unwrap();
        let outcome = engine.request_match(&user("b"), interests(&[])).await.unwrap();
        assert_eq!(outcome, MatchOutcome::Enqueued);
    }

    #[tokio::test]
    async fn highest_overlap_wins() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();
        engine.request_match(&user("b"), interests(&["x", "y", "z"])).await.unwrap();
        engine.request_match(&user("c"), interests(&["x", "y"])).await.unwrap();

        let (_, partner, common) = matched(
            engine
                .request_match(&user("d"), interests(&["x", "y", "z"]))
                .await
                .unwrap(),
        );
        assert_eq!(partner.user_id, user("b"));
        assert_eq!(common.len(), 3);
    }

    #[tokio::test]
    async fn ties_go_to_the_longest_waiter() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();
        engine.request_match(&user("b"), interests(&["x"])).await.unwrap();

        let (_, partner, _) = matched(
            engine.request_match(&user("c"), interests(&["x"])).await.unwrap(),
        );
        assert_eq!(partner.user_id, user("a"));
    }

    #[tokio::test]
    async fn repeat_request_replaces_interests() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();
        engine.request_match(&user("b"), interests(&["y"])).await.unwrap();

        let (_, partner, common) = matched(
            engine.request_match(&user("a"), interests(&["y"])).await.unwrap(),
        );
        assert_eq!(partner.user_id, user("b"));
        assert_eq!(common, vec!["y".to_string()]);
        assert_eq!(engine.waiting_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn active_identity_cannot_request_again() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();
        engine.request_match(&user("b"), interests(&["x"])).await.unwrap();

        let err = engine
            .request_match(&user("a"), interests(&["x"]))
            .await
            .unwrap_err();
        assert_eq!(err, MatchError::AlreadyActive);
        assert_eq!(engine.waiting_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();

        assert!(engine.cancel(&user("a")).await.unwrap());
        assert!(!engine.cancel(&user("a")).await.unwrap());
        assert!(!engine.cancel(&user("never-queued")).await.unwrap());
        assert!(!engine.is_waiting(&user("a")).await.unwrap());
    }

    #[tokio::test]
    async fn end_session_releases_both_once() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();
        let (session, _, _) = matched(
            engine.request_match(&user("b"), interests(&["x"])).await.unwrap(),
        );

        let ended = engine.end_session(session.id()).await.unwrap();
        assert_eq!(ended.status(), MatchSessionStatus::Completed);
        assert!(ended.actual_ended_at().is_some());
        assert!(!engine.is_active(&user("a")).await.unwrap());
        assert!(!engine.is_active(&user("b")).await.unwrap());

        assert!(engine.end_session(session.id()).await.is_none());
        assert!(engine.end_session_of(&user("a")).await.is_none());
    }

    #[tokio::test]
    async fn released_participants_can_match_again() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();
        engine.request_match(&user("b"), interests(&["x"])).await.unwrap();
        engine.end_session_of(&user("b")).await;

        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();
        let (_, partner, _) = matched(
            engine.request_match(&user("b"), interests(&["x"])).await.unwrap(),
        );
        assert_eq!(partner.user_id, user("a"));
    }

    #[tokio::test]
    async fn activate_starts_countdown() {
        let engine = engine();
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();
        let (session, _, _) = matched(
            engine.request_match(&user("b"), interests(&["x"])).await.unwrap(),
        );

        let active = engine.activate(session.id(), 600).await.unwrap();
        assert_eq!(active.status(), MatchSessionStatus::Active);
        assert!(active.ends_at().is_some());
    }

    #[tokio::test]
    async fn concurrent_requests_never_double_book() {
        let engine = Arc::new(engine());
        engine.request_match(&user("waiter"), interests(&["x"])).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .request_match(&user(&format!("u{i}")), interests(&["x"]))
                    .await
            }));
        }

        let mut sessions = Vec::new();
        for handle in handles {
            if let Ok(MatchOutcome::Matched { session, .. }) = handle.await.unwrap() {
                sessions.push(session);
            }
        }

        // 9 identities with one shared tag: 4 pairs, 1 left waiting.
        assert_eq!(sessions.len(), 4);
        let mut seen = std::collections::HashSet::new();
        for session in &sessions {
            for participant in session.participants() {
                assert!(seen.insert(participant.clone()), "{participant} matched twice");
            }
        }
        assert_eq!(engine.waiting_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_queue_drop_releases_the_claim() {
        let queue = Arc::new(DropFailingQueue::default());
        let flags = Arc::new(InMemoryActiveFlags::new());
        let engine = engine_with(queue.clone(), flags.clone());
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();

        queue.fail_drop.store(true, Ordering::SeqCst);
        let err = engine
            .request_match(&user("b"), interests(&["x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::Backend(_)));

        // Nothing moved: a still waits, nobody is flagged, no session exists.
        assert!(engine.is_waiting(&user("a")).await.unwrap());
        assert!(!engine.is_waiting(&user("b")).await.unwrap());
        assert!(!flags.is_active(&user("a")).await.unwrap());
        assert!(!flags.is_active(&user("b")).await.unwrap());
        assert!(engine.session_of(&user("b")).await.is_none());

        // The retry is not mistaken for an active user.
        queue.fail_drop.store(false, Ordering::SeqCst);
        let (_, partner, _) = matched(
            engine.request_match(&user("b"), interests(&["x"])).await.unwrap(),
        );
        assert_eq!(partner.user_id, user("a"));
    }

    #[tokio::test]
    async fn flag_backend_outage_changes_nothing() {
        let queue = Arc::new(InMemoryWaitingQueue::new());
        let flags = Arc::new(InMemoryActiveFlags::new());
        let engine = engine_with(queue.clone(), flags.clone());
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();

        flags.set_failing(true);
        let err = engine
            .request_match(&user("b"), interests(&["x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::Backend(_)));
        assert_eq!(engine.waiting_count().await.unwrap(), 1);

        flags.set_failing(false);
        assert!(matches!(
            engine.request_match(&user("b"), interests(&["x"])).await.unwrap(),
            MatchOutcome::Matched { .. }
        ));
    }

    #[tokio::test]
    async fn queue_outage_on_enqueue_is_reported() {
        let queue = Arc::new(InMemoryWaitingQueue::new());
        let engine = engine_with(queue.clone(), Arc::new(InMemoryActiveFlags::new()));

        queue.set_failing(true);
        assert!(matches!(
            engine.request_match(&user("a"), interests(&["x"])).await,
            Err(MatchError::Backend(_))
        ));
        assert!(matches!(engine.cancel(&user("a")).await, Err(MatchError::Backend(_))));

        queue.set_failing(false);
        assert!(!engine.is_waiting(&user("a")).await.unwrap());
    }

    #[tokio::test]
    async fn claim_lost_elsewhere_falls_back_to_next_best() {
        let flags = Arc::new(ContestedFlags {
            inner: InMemoryActiveFlags::new(),
            contested: user("a"),
        });
        let engine = engine_with(Arc::new(InMemoryWaitingQueue::new()), flags);
        engine.request_match(&user("a"), interests(&["x", "y"])).await.unwrap();
        engine.request_match(&user("c"), interests(&["x"])).await.unwrap();

        let (_, partner, _) = matched(
            engine.request_match(&user("b"), interests(&["x", "y"])).await.unwrap(),
        );
        assert_eq!(partner.user_id, user("c"));
    }

    #[tokio::test]
    async fn lifecycle_writes_land_in_order_when_ended_before_activation() {
        let store = Arc::new(InMemoryMatchStore::new());
        let engine = MatchingEngine::new(
            Arc::new(InMemoryWaitingQueue::new()),
            Arc::new(InMemoryActiveFlags::new()),
            Arc::new(SessionRegistry::new()),
            PersistenceWriter::spawn(store.clone()),
            "10mb",
        );
        engine.request_match(&user("a"), interests(&["x"])).await.unwrap();
        let (session, _, _) = matched(
            engine.request_match(&user("b"), interests(&["x"])).await.unwrap(),
        );

        // The partner drops before the countdown starts.
        engine.end_session_of(&user("a")).await.unwrap();
        assert!(engine.activate(session.id(), 600).await.is_err());
        engine.writer.flush().await;

        let record = store.get_session(session.id()).await.unwrap().unwrap();
        assert_eq!(record.status, MatchSessionStatus::Completed);
        assert!(record.actual_ended_at.is_some());
    }
}
