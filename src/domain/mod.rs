//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, auth)
//! - `matching` - Interest matching, session lifecycle and participant events

pub mod foundation;
pub mod matching;
