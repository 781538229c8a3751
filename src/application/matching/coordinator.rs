//! MatchCoordinator - connection-facing orchestration.
//!
//! Owns the event flow between a transport and the matching core:
//!
//! ```text
//! connect ──> verify credential ──> register connection ──> presence on
//! match:start ──> rate limit ──> engine ──┬─> match:searching
//!                                         └─> match:found x2 ──> timer
//! timer tick ──> match:timer_sync x2 ... match:timer_end x2 ──> finalize
//! match:leave / disconnect ──> finalize ──> match:partner_left
//! ```
//!
//! Failures never escape to the transport as panics; each one becomes a
//! log line and, where a client is waiting on an answer, a `match:error`.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::MatchingConfig;
use crate::domain::foundation::{AuthError, ConnectionId, UserId};
use crate::domain::matching::{
    InterestSet, MatchError, MatchFound, MatchNotification, MatchOutcome, MatchSession,
    PartnerProfile, TimerEvent, WaitingEntry,
};
use crate::ports::{
    ActiveFlags, IdentityVerifier, MatchStore, RateLimitKey, RateLimitResult, RateLimiter,
    WaitingQueue,
};

use super::{
    ConnectionRegistry, MatchingEngine, Notifier, Outbound, PersistenceWriter, SessionRegistry,
    SessionTimer,
};

/// Storage choices for the coordinator, in-memory or Redis/Postgres.
pub struct MatchBackends {
    pub queue: Arc<dyn WaitingQueue>,
    pub flags: Arc<dyn ActiveFlags>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub store: Arc<dyn MatchStore>,
}

pub struct MatchCoordinator {
    config: MatchingConfig,
    verifier: Arc<dyn IdentityVerifier>,
    rate_limiter: Arc<dyn RateLimiter>,
    store: Arc<dyn MatchStore>,
    connections: Arc<ConnectionRegistry>,
    notifier: Notifier,
    engine: Arc<MatchingEngine>,
    timer: Arc<SessionTimer>,
    writer: PersistenceWriter,
}

impl MatchCoordinator {
    /// Wires the matching core. Spawns the persistence worker, so this
    /// must run inside a tokio runtime.
    pub fn new(
        config: MatchingConfig,
        verifier: Arc<dyn IdentityVerifier>,
        backends: MatchBackends,
    ) -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let writer = PersistenceWriter::spawn(backends.store.clone());
        let engine = Arc::new(MatchingEngine::new(
            backends.queue,
            backends.flags,
            Arc::new(SessionRegistry::new()),
            writer.clone(),
            config.media_channel_prefix.clone(),
        ));
        let timer = Arc::new(SessionTimer::new(
            config.session_duration_secs,
            config.warning_secs,
        ));

        Self {
            notifier: Notifier::new(connections.clone()),
            writer,
            rate_limiter: backends.rate_limiter,
            store: backends.store,
            config,
            verifier,
            connections,
            engine,
            timer,
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Connection lifecycle
    // ════════════════════════════════════════════════════════════════════════

    /// Authenticates a new connection and registers its outbound channel.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the credential is missing or rejected
    pub async fn connect(
        &self,
        credential: Option<&str>,
        outbound: Outbound,
    ) -> Result<(ConnectionId, UserId), MatchError> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(MatchError::Unauthenticated(AuthError::MissingCredential))?;

        let user = self.verifier.verify(credential).await.map_err(|e| {
            tracing::debug!(error = %e, "Connection rejected");
            MatchError::from(e)
        })?;

        let connection = ConnectionId::new();
        self.connections
            .register(connection, user.id.clone(), outbound)
            .await;
        self.writer.presence(&user.id, true);

        tracing::info!(user_id = %user.id, connection_id = %connection, "Connected");
        Ok((connection, user.id))
    }

    /// Tears down everything a connection was involved in.
    ///
    /// Forgets the identity's rate window, withdraws it from the queue,
    /// ends its live session (telling the partner) and marks it offline.
    pub async fn disconnect(&self, connection: &ConnectionId) {
        let Some(user) = self.connections.unregister(connection).await else {
            return;
        };

        if let Err(e) = self.rate_limiter.reset(RateLimitKey::match_start(&user)).await {
            tracing::warn!(user_id = %user, error = %e, "Failed to reset rate window");
        }
        if let Err(e) = self.engine.cancel(&user).await {
            tracing::warn!(user_id = %user, error = %e, "Failed to leave queue on disconnect");
        }
        self.end_session_of(&user).await;
        self.writer.presence(&user, false);

        tracing::info!(user_id = %user, connection_id = %connection, "Disconnected");
    }

    /// Re-asserts presence for an already connected identity.
    pub async fn mark_online(&self, connection: &ConnectionId) -> Result<(), MatchError> {
        let user = self.identity(connection).await?;
        self.writer.presence(&user, true);
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Matching
    // ════════════════════════════════════════════════════════════════════════

    /// Handles `match:start`.
    ///
    /// The outcome is always delivered to the requester as a notification;
    /// the returned error is for logging only.
    pub async fn start_match(
        &self,
        connection: &ConnectionId,
        interests: Vec<String>,
    ) -> Result<(), MatchError> {
        let user = self.identity(connection).await?;

        match self.rate_limiter.check(RateLimitKey::match_start(&user)).await {
            Ok(RateLimitResult::Allowed(_)) => {}
            Ok(RateLimitResult::Denied(denied)) => {
                tracing::info!(
                    user_id = %user,
                    retry_after_secs = denied.retry_after_secs,
                    "Match request throttled"
                );
                return self.reject(&user, MatchError::Throttled).await;
            }
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Rate limiter unavailable, allowing request");
            }
        }

        let interests = InterestSet::from_raw(interests);
        let outcome = match self.engine.request_match(&user, interests.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => return self.reject(&user, e).await,
        };

        match outcome {
            MatchOutcome::Enqueued => {
                let waiting_count = self.engine.waiting_count().await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Failed to read queue size");
                    1
                });
                self.notifier
                    .notify(&user, MatchNotification::Searching { waiting_count })
                    .await;
            }
            MatchOutcome::Matched {
                session,
                partner,
                common_interests,
            } => {
                let requester = WaitingEntry::new(user, interests);
                self.announce_match(&session, &requester, &partner, common_interests)
                    .await;
                self.start_countdown(&session).await;
            }
        }
        Ok(())
    }

    /// Handles `match:cancel`. Always answers with `match:cancelled`.
    pub async fn cancel_match(&self, connection: &ConnectionId) -> Result<bool, MatchError> {
        let user = self.identity(connection).await?;
        self.cancel_for(&user).await
    }

    /// Withdraws `user` from the queue, wherever the request came from.
    pub async fn cancel_for(&self, user: &UserId) -> Result<bool, MatchError> {
        match self.engine.cancel(user).await {
            Ok(removed) => {
                self.notifier.notify(user, MatchNotification::Cancelled).await;
                Ok(removed)
            }
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Failed to cancel matching");
                self.notifier
                    .notify(user, MatchNotification::error("Failed to cancel matching"))
                    .await;
                Err(e)
            }
        }
    }

    /// Handles `match:leave`. Returns whether a live session was ended.
    pub async fn leave_match(&self, connection: &ConnectionId) -> Result<bool, MatchError> {
        let user = self.identity(connection).await?;
        Ok(self.end_session_of(&user).await)
    }

    /// Users flagged online, or the queue size if the store is unreachable.
    pub async fn online_count(&self) -> u64 {
        match self.store.online_count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Online count unavailable, using queue size");
                self.engine.waiting_count().await.unwrap_or(0) as u64
            }
        }
    }

    pub async fn session_of(&self, user: &UserId) -> Option<MatchSession> {
        self.engine.session_of(user).await
    }

    pub async fn is_waiting(&self, user: &UserId) -> Result<bool, MatchError> {
        self.engine.is_waiting(user).await
    }

    pub async fn is_active(&self, user: &UserId) -> Result<bool, MatchError> {
        self.engine.is_active(user).await
    }

    pub async fn running_timers(&self) -> usize {
        self.timer.active_count().await
    }

    /// Waits for queued persistence writes to land.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    /// Stops every countdown and drains pending writes.
    pub async fn shutdown(&self) {
        self.timer.shutdown().await;
        self.writer.close().await;
        tracing::info!("Match coordinator stopped");
    }

    // ════════════════════════════════════════════════════════════════════════
    // Internals
    // ════════════════════════════════════════════════════════════════════════

    async fn identity(&self, connection: &ConnectionId) -> Result<UserId, MatchError> {
        self.connections
            .identity_of(connection)
            .await
            .ok_or(MatchError::NotConnected)
    }

    async fn reject(&self, user: &UserId, error: MatchError) -> Result<(), MatchError> {
        if let MatchError::Backend(detail) = &error {
            tracing::error!(user_id = %user, error = %detail, "Matching failed");
        }
        self.notifier
            .notify(user, MatchNotification::error(error.client_message()))
            .await;
        Err(error)
    }

    async fn announce_match(
        &self,
        session: &MatchSession,
        requester: &WaitingEntry,
        partner: &WaitingEntry,
        common_interests: Vec<String>,
    ) {
        let (requester_profile, partner_profile) =
            tokio::join!(self.profile_of(requester), self.profile_of(partner));

        let found = |partner_id: &UserId, profile: PartnerProfile| {
            MatchNotification::Found(MatchFound {
                session_id: *session.id(),
                partner_id: partner_id.clone(),
                partner: profile,
                common_interests: common_interests.clone(),
                media_channel_id: session.media_channel_id().to_string(),
            })
        };

        self.notifier
            .notify(&requester.user_id, found(&partner.user_id, partner_profile))
            .await;
        self.notifier
            .notify(&partner.user_id, found(&requester.user_id, requester_profile))
            .await;
    }

    /// Stored profile, falling back to what the queue entry carried.
    async fn profile_of(&self, entry: &WaitingEntry) -> PartnerProfile {
        let fallback = || PartnerProfile {
            nickname: None,
            interests: entry.interests.as_slice().to_vec(),
        };

        match self.store.get_profile(&entry.user_id).await {
            Ok(Some(profile)) => PartnerProfile {
                nickname: profile.nickname,
                interests: if profile.interests.is_empty() {
                    entry.interests.as_slice().to_vec()
                } else {
                    profile.interests
                },
            },
            Ok(None) => fallback(),
            Err(e) => {
                tracing::warn!(user_id = %entry.user_id, error = %e, "Profile lookup failed");
                fallback()
            }
        }
    }

    async fn start_countdown(&self, session: &MatchSession) {
        let duration = u64::from(self.config.session_duration_secs);
        let active = match self.engine.activate(session.id(), duration).await {
            Ok(active) => active,
            Err(e) => {
                // Someone left before the call started.
                tracing::debug!(session_id = %session.id(), error = %e, "Session not started");
                return;
            }
        };
        let Some(events) = self.timer.start(*active.id()).await else {
            return;
        };
        if !self.engine.is_live(active.id()).await {
            self.timer.stop(active.id()).await;
            return;
        }

        let relay = TimerRelay {
            session: active,
            engine: self.engine.clone(),
            notifier: self.notifier.clone(),
        };
        tokio::spawn(relay.run(events));
    }

    /// Ends `user`'s live session, if any, and tells the partner.
    async fn end_session_of(&self, user: &UserId) -> bool {
        let Some(session) = self.engine.end_session_of(user).await else {
            return false;
        };

        self.timer.stop(session.id()).await;
        if let Some(partner) = session.partner_of(user) {
            self.notifier
                .notify(partner, MatchNotification::PartnerLeft)
                .await;
        }
        tracing::info!(session_id = %session.id(), user_id = %user, "Left session early");
        true
    }
}

/// Forwards one session's countdown to both participants.
struct TimerRelay {
    session: MatchSession,
    engine: Arc<MatchingEngine>,
    notifier: Notifier,
}

impl TimerRelay {
    async fn run(self, mut events: mpsc::UnboundedReceiver<TimerEvent>) {
        let id = *self.session.id();
        let participants = self.session.participants();

        while let Some(event) = events.recv().await {
            let notification = match event {
                TimerEvent::Tick { remaining_seconds } => {
                    MatchNotification::TimerSync { remaining_seconds }
                }
                TimerEvent::Warning => MatchNotification::TimerWarning,
                TimerEvent::Ended => {
                    if self.engine.end_session(&id).await.is_some() {
                        self.notifier
                            .notify_all(participants, MatchNotification::TimerEnd)
                            .await;
                    }
                    break;
                }
            };

            // Events queued before an early leave must not reach anyone.
            if self.engine.is_live(&id).await {
                self.notifier.notify_all(participants, notification).await;
            }
        }
    }
}
