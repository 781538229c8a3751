//! Application layer - use cases over the domain and ports.
//!
//! Long-lived services (the coordinator and its parts) live alongside
//! command handlers such as `RateSessionHandler`.

pub mod matching;

pub use matching::{
    MatchBackends, MatchCoordinator, RateSessionCommand, RateSessionHandler, RateSessionResult,
};
