//! HTTP DTOs for matchmaking endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::matching::Rating;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/match/:session_id/rate`.
#[derive(Debug, Clone, Deserialize)]
pub struct RateSessionRequest {
    pub rating: Rating,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OnlineCountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Error body shared by every matchmaking endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", error)
    }

    pub fn internal(error: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", error)
    }
}
