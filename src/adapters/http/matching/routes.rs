//! HTTP routes for matchmaking endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers::{cancel_match, online_count, rate_session, MatchHandlers};

/// Creates the matchmaking router, mounted under `/api/match`.
pub fn match_routes(handlers: MatchHandlers) -> Router {
    Router::new()
        .route("/online-count", get(online_count))
        .route("/cancel", delete(cancel_match))
        .route("/:session_id/rate", post(rate_session))
        .with_state(handlers)
}
