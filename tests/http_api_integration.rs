//! HTTP integration tests for the matchmaking REST surface.
//!
//! Builds the full application router over in-memory backends and drives it
//! with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use voice_match::adapters::auth::MockIdentityVerifier;
use voice_match::adapters::http::{app_router, AppServices};
use voice_match::adapters::matching::{InMemoryActiveFlags, InMemoryWaitingQueue};
use voice_match::adapters::persistence::InMemoryMatchStore;
use voice_match::adapters::rate_limiter::InMemoryRateLimiter;
use voice_match::application::{MatchBackends, MatchCoordinator, RateSessionHandler};
use voice_match::config::{MatchingConfig, ServerConfig};
use voice_match::domain::foundation::{SessionId, UserId};
use voice_match::domain::matching::{MatchNotification, MatchSession, Rating};
use voice_match::ports::{MatchStore, UserProfile};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct TestApp {
    router: Router,
    coordinator: Arc<MatchCoordinator>,
    store: Arc<InMemoryMatchStore>,
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn test_app() -> TestApp {
    let verifier = Arc::new(
        MockIdentityVerifier::new()
            .with_test_user("tok-alice", "alice")
            .with_test_user("tok-bob", "bob")
            .with_test_user("tok-carol", "carol"),
    );
    let store = Arc::new(InMemoryMatchStore::new());
    let coordinator = Arc::new(MatchCoordinator::new(
        MatchingConfig::default(),
        verifier.clone(),
        MatchBackends {
            queue: Arc::new(InMemoryWaitingQueue::new()),
            flags: Arc::new(InMemoryActiveFlags::new()),
            rate_limiter: Arc::new(InMemoryRateLimiter::with_defaults()),
            store: store.clone(),
        },
    ));

    let router = app_router(
        AppServices {
            coordinator: coordinator.clone(),
            rate_handler: Arc::new(RateSessionHandler::new(store.clone())),
            verifier,
        },
        &ServerConfig::default(),
    );

    TestApp {
        router,
        coordinator,
        store,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn rate_request(session_id: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/match/{session_id}/rate"))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// A finished alice/bob session in the store.
async fn stored_session(store: &InMemoryMatchStore) -> SessionId {
    store.insert_profile(user("alice"), UserProfile::default()).await;
    store.insert_profile(user("bob"), UserProfile::default()).await;

    let session =
        MatchSession::new(SessionId::new(), user("alice"), user("bob"), vec![], "10mb-test")
            .unwrap();
    store.create_session(&session).await.unwrap();
    store.add_participant(session.id(), &user("alice")).await.unwrap();
    store.add_participant(session.id(), &user("bob")).await.unwrap();
    *session.id()
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();
    let request = Request::get("/health").body(Body::empty()).unwrap();

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn online_count_reflects_connected_users() {
    let app = test_app();
    let (tx, _rx) = mpsc::unbounded_channel();
    app.coordinator.connect(Some("tok-alice"), tx).await.unwrap();
    app.coordinator.flush().await;

    let request = Request::get("/api/match/online-count")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "count": 1 }));
}

#[tokio::test]
async fn matching_cannot_be_started_over_rest() {
    let app = test_app();
    let request = Request::post("/api/match/start")
        .header(header::AUTHORIZATION, "Bearer tok-alice")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "interests": ["music"] }).to_string()))
        .unwrap();

    let (status, _) = send(&app.router, request).await;

    assert!(status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED);
    assert!(!app.coordinator.is_waiting(&user("alice")).await.unwrap());
}

// =============================================================================
// DELETE /api/match/cancel
// =============================================================================

#[tokio::test]
async fn cancel_requires_authentication() {
    let app = test_app();
    let request = Request::delete("/api/match/cancel")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cancel_rejects_bad_token() {
    let app = test_app();
    let request = Request::delete("/api/match/cancel")
        .header(header::AUTHORIZATION, "Bearer forged")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn cancel_removes_waiting_user_and_notifies_socket() {
    let app = test_app();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (conn, alice) = app.coordinator.connect(Some("tok-alice"), tx).await.unwrap();
    app.coordinator
        .start_match(&conn, vec!["music".to_string()])
        .await
        .unwrap();
    rx.recv().await;

    let request = Request::delete("/api/match/cancel")
        .header(header::AUTHORIZATION, "Bearer tok-alice")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert!(!app.coordinator.is_waiting(&alice).await.unwrap());
    assert_eq!(rx.recv().await, Some(MatchNotification::Cancelled));
}

// =============================================================================
// POST /api/match/:session_id/rate
// =============================================================================

#[tokio::test]
async fn participant_can_rate_session() {
    let app = test_app();
    let id = stored_session(&app.store).await;

    let request = rate_request(&id.to_string(), Some("tok-alice"), json!({ "rating": "good" }));
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert_eq!(
        app.store.rating_of(&id, &user("alice")).await,
        Some(Rating::Good)
    );
    let profile = app.store.get_profile(&user("alice")).await.unwrap().unwrap();
    assert_eq!(profile.total_calls, 1);
}

#[tokio::test]
async fn outsider_cannot_rate_session() {
    let app = test_app();
    let id = stored_session(&app.store).await;

    let request = rate_request(&id.to_string(), Some("tok-carol"), json!({ "rating": "good" }));
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NOT_PARTICIPANT");
}

#[tokio::test]
async fn rating_unknown_session_is_not_found_or_forbidden() {
    let app = test_app();
    stored_session(&app.store).await;

    let request = rate_request(
        &SessionId::new().to_string(),
        Some("tok-alice"),
        json!({ "rating": "neutral" }),
    );
    let (status, _) = send(&app.router, request).await;

    assert!(status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_session_id_is_bad_request() {
    let app = test_app();

    let request = rate_request("not-a-uuid", Some("tok-alice"), json!({ "rating": "good" }));
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn unknown_rating_value_is_rejected() {
    let app = test_app();
    let id = stored_session(&app.store).await;

    let request = rate_request(&id.to_string(), Some("tok-alice"), json!({ "rating": "great" }));
    let (status, _) = send(&app.router, request).await;

    assert!(status.is_client_error());
    assert_eq!(app.store.rating_of(&id, &user("alice")).await, None);
}

#[tokio::test]
async fn rating_requires_authentication() {
    let app = test_app();
    let id = stored_session(&app.store).await;

    let request = rate_request(&id.to_string(), None, json!({ "rating": "good" }));
    let (status, _) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
