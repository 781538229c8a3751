//! Matchmaking REST endpoints.
//!
//! Matching itself runs over the websocket; these cover the side channels:
//! online count, cancelling from outside the socket and post-call rating.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, OnlineCountResponse, RateSessionRequest, SuccessResponse};
pub use handlers::MatchHandlers;
pub use routes::match_routes;
