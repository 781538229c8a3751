//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `VOICE_MATCH` prefix
//! and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use voice_match::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod database;
mod error;
mod matching;
mod redis;
mod server;

pub use self::auth::AuthConfig;
pub use self::database::DatabaseConfig;
pub use self::error::{ConfigError, ValidationError};
pub use self::matching::MatchingConfig;
pub use self::redis::RedisConfig;
pub use self::server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub auth: AuthConfig,

    #[serde(default)]
    pub matching: MatchingConfig,

    /// Absent: queue, flags and rate limits stay in process memory
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// Absent: sessions and presence stay in process memory
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// - `VOICE_MATCH__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `VOICE_MATCH__AUTH__JWT_SECRET=...` -> `auth.jwt_secret = ...`
    /// - `VOICE_MATCH__REDIS__URL=redis://...` enables the Redis backends
    ///
    /// A `.env` file is read first when present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("VOICE_MATCH")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.matching.validate()?;
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        if let Some(database) = &self.database {
            database.validate()?;
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
