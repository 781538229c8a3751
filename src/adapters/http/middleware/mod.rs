//! HTTP middleware for axum.
//!
//! - `auth` - Bearer-token authentication and the `RequireAuth` extractor

pub mod auth;

pub use auth::{auth_middleware, bearer_token, AuthRejection, AuthState, RequireAuth};
