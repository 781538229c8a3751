//! Matchmaking use cases.
//!
//! - `ConnectionRegistry` / `Notifier` - who is connected and how to reach them
//! - `MatchingEngine` - queue scan and session creation under one gate
//! - `SessionTimer` - per-session countdown
//! - `PersistenceWriter` - background durable writes
//! - `MatchCoordinator` - the event flow tying these together
//! - `RateSessionHandler` - post-call rating command

mod connections;
mod coordinator;
mod engine;
mod notifier;
mod persistence_writer;
mod rate_session;
mod session_registry;
mod session_timer;

pub use connections::{ConnectionRegistry, Outbound};
pub use coordinator::{MatchBackends, MatchCoordinator};
pub use engine::MatchingEngine;
pub use notifier::Notifier;
pub use persistence_writer::PersistenceWriter;
pub use rate_session::{RateSessionCommand, RateSessionHandler, RateSessionResult};
pub use session_registry::SessionRegistry;
pub use session_timer::SessionTimer;
