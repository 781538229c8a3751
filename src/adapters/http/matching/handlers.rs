//! HTTP handlers for matchmaking endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::middleware::RequireAuth;
use crate::application::matching::{MatchCoordinator, RateSessionCommand, RateSessionHandler};
use crate::domain::foundation::{DomainError, ErrorCode, SessionId};

use super::dto::{ErrorResponse, OnlineCountResponse, RateSessionRequest, SuccessResponse};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct MatchHandlers {
    coordinator: Arc<MatchCoordinator>,
    rate_handler: Arc<RateSessionHandler>,
}

impl MatchHandlers {
    pub fn new(coordinator: Arc<MatchCoordinator>, rate_handler: Arc<RateSessionHandler>) -> Self {
        Self {
            coordinator,
            rate_handler,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// GET /api/match/online-count - Number of users online
pub async fn online_count(State(handlers): State<MatchHandlers>) -> Response {
    let count = handlers.coordinator.online_count().await;
    (StatusCode::OK, Json(OnlineCountResponse { count })).into_response()
}

/// DELETE /api/match/cancel - Leave the waiting queue
pub async fn cancel_match(
    State(handlers): State<MatchHandlers>,
    RequireAuth(user): RequireAuth,
) -> Response {
    match handlers.coordinator.cancel_for(&user.id).await {
        Ok(_) => (StatusCode::OK, Json(SuccessResponse::ok())).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal(e.client_message())),
        )
            .into_response(),
    }
}

/// POST /api/match/:session_id/rate - Rate a finished call
pub async fn rate_session(
    State(handlers): State<MatchHandlers>,
    RequireAuth(user): RequireAuth,
    Path(session_id): Path<String>,
    Json(req): Json<RateSessionRequest>,
) -> Response {
    let session_id = match session_id.parse::<SessionId>() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request("Invalid session ID")),
            )
                .into_response()
        }
    };

    let cmd = RateSessionCommand {
        session_id,
        user_id: user.id,
        rating: req.rating,
    };

    match handlers.rate_handler.handle(cmd).await {
        Ok(_) => (StatusCode::OK, Json(SuccessResponse::ok())).into_response(),
        Err(e) => handle_domain_error(e),
    }
}

fn handle_domain_error(error: DomainError) -> Response {
    let status = match error.code {
        ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorCode::SessionNotFound | ErrorCode::UserNotFound => StatusCode::NOT_FOUND,
        ErrorCode::NotParticipant => StatusCode::FORBIDDEN,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(code = %error.code, error = %error, "Request failed");
        return (status, Json(ErrorResponse::internal("Internal server error"))).into_response();
    }
    (status, Json(ErrorResponse::new(error.code.to_string(), error.message))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_participant_maps_to_forbidden() {
        let response = handle_domain_error(DomainError::new(ErrorCode::NotParticipant, "nope"));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn storage_failures_hide_details() {
        let response = handle_domain_error(DomainError::new(ErrorCode::DatabaseError, "pg down"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
