//! MatchStore adapters.
//!
//! - `InMemoryMatchStore` - used in tests and when no database is configured
//! - `PostgresMatchStore` - `users`, `match_sessions`, `match_participants`
//!   (schema under `migrations/`)

mod in_memory;
mod postgres;

pub use in_memory::InMemoryMatchStore;
pub use postgres::PostgresMatchStore;
