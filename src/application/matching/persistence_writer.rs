//! PersistenceWriter - fire-and-forget durable writes.
//!
//! Session records and presence flags are written by a single background
//! worker so the matching path never waits on the database. Jobs apply in
//! the order they were submitted. A failed write is logged and dropped;
//! in-memory state stays authoritative.
//!
//! ## Shutdown
//!
//! Dropping every `PersistenceWriter` handle (or calling `close`) lets the
//! worker drain what is queued and exit.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::domain::foundation::{DomainError, SessionId, Timestamp, UserId};
use crate::domain::matching::MatchSession;
use crate::ports::{MatchStore, SessionUpdate};

#[derive(Debug)]
enum Job {
    SessionCreated(MatchSession),
    SessionActivated {
        id: SessionId,
        started_at: Timestamp,
        ends_at: Timestamp,
    },
    SessionCompleted {
        id: SessionId,
        ended_at: Timestamp,
    },
    Presence {
        user: UserId,
        online: bool,
    },
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle used to submit writes.
#[derive(Clone)]
pub struct PersistenceWriter {
    jobs: mpsc::UnboundedSender<Job>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PersistenceWriter {
    /// Spawns the worker. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn MatchStore>) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(store, rx));
        Self {
            jobs,
            worker: Arc::new(Mutex::new(Some(worker))),
        }
    }

    /// Records a new session and both of its participants.
    pub fn session_created(&self, session: &MatchSession) {
        self.submit(Job::SessionCreated(session.clone()));
    }

    /// Records that the countdown started.
    pub fn session_activated(&self, session: &MatchSession) {
        match (session.started_at(), session.ends_at()) {
            (Some(started_at), Some(ends_at)) => self.submit(Job::SessionActivated {
                id: *session.id(),
                started_at: *started_at,
                ends_at: *ends_at,
            }),
            _ => tracing::warn!(session_id = %session.id(), "Session has no countdown window"),
        }
    }

    pub fn session_completed(&self, session: &MatchSession) {
        let ended_at = session.actual_ended_at().copied().unwrap_or_else(Timestamp::now);
        self.submit(Job::SessionCompleted {
            id: *session.id(),
            ended_at,
        });
    }

    pub fn presence(&self, user: &UserId, online: bool) {
        self.submit(Job::Presence {
            user: user.clone(),
            online,
        });
    }

    /// Waits until every job submitted before this call has been applied.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        self.submit(Job::Flush(ack));
        let _ = done.await;
    }

    /// Stops accepting work and waits for the worker to drain.
    pub async fn close(&self) {
        self.flush().await;
        if let Some(worker) = self.worker.lock().await.take() {
            worker.abort();
            let _ = worker.await;
        }
    }

    fn submit(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            tracing::warn!("Persistence worker has stopped, dropping write");
        }
    }
}

async fn run(store: Arc<dyn MatchStore>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    tracing::debug!("Persistence worker started");
    while let Some(job) = jobs.recv().await {
        if let Err(e) = apply(store.as_ref(), job).await {
            tracing::warn!(code = %e.code, error = %e, "Persistence write failed");
        }
    }
    tracing::debug!("Persistence worker stopped");
}

async fn apply(store: &dyn MatchStore, job: Job) -> Result<(), DomainError> {
    match job {
        Job::SessionCreated(session) => {
            store.create_session(&session).await?;
            for user in session.participants() {
                store.add_participant(session.id(), user).await?;
            }
        }
        Job::SessionActivated {
            id,
            started_at,
            ends_at,
        } => {
            store
                .update_session(&id, SessionUpdate::activated(started_at, ends_at))
                .await?;
        }
        Job::SessionCompleted { id, ended_at } => {
            store
                .update_session(&id, SessionUpdate::completed(ended_at))
                .await?;
        }
        Job::Presence { user, online } => {
            store.set_online(&user, online).await?;
        }
        Job::Flush(ack) => {
            let _ = ack.send(());
        }
    }
    Ok(())
}
