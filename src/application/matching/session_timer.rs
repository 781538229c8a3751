//! Per-session countdown.
//!
//! Each running session owns one background task that ticks once per
//! second, emitting `TimerEvent`s on a channel returned by `start`:
//!
//! ```text
//! Tick(599) .. Tick(120) Warning Tick(119) .. Tick(0) Ended
//! ```
//!
//! The timer table lock linearizes `stop` against the countdown: once
//! `stop` returns, the task emits nothing further for that session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::domain::foundation::SessionId;
use crate::domain::matching::TimerEvent;

const TICK: Duration = Duration::from_secs(1);

struct TimerEntry {
    generation: u64,
    remaining: Arc<AtomicU32>,
    handle: JoinHandle<()>,
}

type TimerTable = Arc<Mutex<HashMap<SessionId, TimerEntry>>>;

pub struct SessionTimer {
    duration_secs: u32,
    warning_secs: u32,
    timers: TimerTable,
    generations: AtomicU64,
}

impl SessionTimer {
    pub fn new(duration_secs: u32, warning_secs: u32) -> Self {
        Self {
            duration_secs,
            warning_secs,
            timers: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// Starts the countdown for `session`.
    ///
    /// Returns `None` without touching the running timer if one already
    /// exists for this session.
    pub async fn start(&self, session: SessionId) -> Option<mpsc::UnboundedReceiver<TimerEvent>> {
        let mut timers = self.timers.lock().await;
        if timers.contains_key(&session) {
            tracing::warn!(session_id = %session, "Timer already running, ignoring start");
            return None;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let remaining = Arc::new(AtomicU32::new(self.duration_secs));
        let countdown = Countdown {
            session,
            generation,
            warning_secs: self.warning_secs,
            remaining: remaining.clone(),
            timers: self.timers.clone(),
            events: events_tx,
        };
        let handle = tokio::spawn(countdown.run(self.duration_secs));

        timers.insert(
            session,
            TimerEntry {
                generation,
                remaining,
                handle,
            },
        );
        tracing::debug!(session_id = %session, seconds = self.duration_secs, "Timer started");
        Some(events_rx)
    }

    /// Cancels a running countdown. Returns false if none was running.
    pub async fn stop(&self, session: &SessionId) -> bool {
        let entry = self.timers.lock().await.remove(session);
        match entry {
            Some(entry) => {
                entry.handle.abort();
                tracing::debug!(session_id = %session, "Timer stopped");
                true
            }
            None => false,
        }
    }

    pub async fn remaining_seconds(&self, session: &SessionId) -> Option<u32> {
        let timers = self.timers.lock().await;
        timers
            .get(session)
            .map(|entry| entry.remaining.load(Ordering::SeqCst))
    }

    pub async fn active_count(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// Cancels every running countdown.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        let count = timers.len();
        for (_, entry) in timers.drain() {
            entry.handle.abort();
        }
        if count > 0 {
            tracing::info!(count, "Stopped running session timers");
        }
    }
}

struct Countdown {
    session: SessionId,
    generation: u64,
    warning_secs: u32,
    remaining: Arc<AtomicU32>,
    timers: TimerTable,
    events: mpsc::UnboundedSender<TimerEvent>,
}

impl Countdown {
    async fn run(self, duration_secs: u32) {
        let mut interval = time::interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let mut left = duration_secs;
        while left > 0 {
            interval.tick().await;
            left -= 1;

            let mut timers = self.timers.lock().await;
            let current = timers
                .get(&self.session)
                .is_some_and(|entry| entry.generation == self.generation);
            if !current {
                return;
            }

            self.remaining.store(left, Ordering::SeqCst);
            // A dropped receiver just means nobody is listening any more.
            let _ = self.events.send(TimerEvent::Tick {
                remaining_seconds: left,
            });
            if left == self.warning_secs {
                let _ = self.events.send(TimerEvent::Warning);
            }
            if left == 0 {
                timers.remove(&self.session);
                let _ = self.events.send(TimerEvent::Ended);
                tracing::debug!(session_id = %self.session, "Timer finished");
            }
        }
    }
}
