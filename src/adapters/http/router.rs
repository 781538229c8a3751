//! Application router.
//!
//! ```text
//! GET    /health
//! GET    /ws                          (websocket, token in query or header)
//! GET    /api/match/online-count
//! DELETE /api/match/cancel            (Bearer)
//! POST   /api/match/:session_id/rate  (Bearer)
//! ```

use std::sync::Arc;

use axum::{http::HeaderValue, middleware, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::adapters::websocket::{websocket_router, WebSocketState};
use crate::application::matching::{MatchCoordinator, RateSessionHandler};
use crate::config::ServerConfig;
use crate::ports::IdentityVerifier;

use super::matching::{match_routes, MatchHandlers};
use super::middleware::{auth_middleware, AuthState};

/// Everything the HTTP surface needs from the application layer.
#[derive(Clone)]
pub struct AppServices {
    pub coordinator: Arc<MatchCoordinator>,
    pub rate_handler: Arc<RateSessionHandler>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

pub fn app_router(services: AppServices, server: &ServerConfig) -> Router {
    let auth_state: AuthState = services.verifier.clone();

    let api = match_routes(MatchHandlers::new(
        services.coordinator.clone(),
        services.rate_handler.clone(),
    ))
    .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
    .layer(TimeoutLayer::new(server.request_timeout()));

    Router::new()
        .route("/health", get(health))
        .nest("/api/match", api)
        .merge(websocket_router(WebSocketState::new(services.coordinator)))
        .layer(cors_layer(server))
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
