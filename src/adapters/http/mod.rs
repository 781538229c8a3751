//! HTTP adapters - REST API and router assembly.

pub mod matching;
pub mod middleware;
pub mod router;

pub use matching::{match_routes, MatchHandlers};
pub use router::{app_router, AppServices};
