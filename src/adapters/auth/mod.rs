//! Authentication adapters.
//!
//! Implementations of the `IdentityVerifier` port:
//!
//! - `jwt` - HS256 shared-secret tokens issued by the identity provider
//! - `mock` - fixed token table for tests and local development

mod jwt;
mod mock;

pub use jwt::JwtIdentityVerifier;
pub use mock::MockIdentityVerifier;
