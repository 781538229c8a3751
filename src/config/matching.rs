//! Matchmaking parameters
//!
//! Defaults reproduce the production service: 10-minute calls, a warning at
//! two minutes left, and five match requests per rolling minute.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MatchingConfig {
    #[serde(default = "default_session_duration")]
    pub session_duration_secs: u32,

    /// Remaining seconds at which `match:timer_warning` fires
    #[serde(default = "default_warning")]
    pub warning_secs: u32,

    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max_requests: u32,

    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u32,

    /// TTL of a Redis queue entry; a stale waiter disappears after this
    #[serde(default = "default_queue_ttl")]
    pub queue_entry_ttl_secs: u64,

    /// TTL of a Redis active flag; must outlive a full session
    #[serde(default = "default_active_ttl")]
    pub active_flag_ttl_secs: u64,

    /// Media channel ids are `{prefix}-{session_id}`
    #[serde(default = "default_channel_prefix")]
    pub media_channel_prefix: String,
}

impl MatchingConfig {
    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs as u64)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.session_duration_secs == 0 {
            return Err(ValidationError::InvalidSessionDuration);
        }
        if self.warning_secs >= self.session_duration_secs {
            return Err(ValidationError::InvalidWarningThreshold);
        }
        if self.rate_limit_max_requests == 0 || self.rate_limit_window_secs == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }
        if self.active_flag_ttl_secs <= self.session_duration_secs as u64 {
            return Err(ValidationError::ActiveFlagTtlTooShort);
        }
        if self.media_channel_prefix.is_empty() {
            return Err(ValidationError::MissingRequired("MATCHING__MEDIA_CHANNEL_PREFIX"));
        }
        Ok(())
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: default_session_duration(),
            warning_secs: default_warning(),
            rate_limit_max_requests: default_rate_limit_max(),
            rate_limit_window_secs: default_rate_limit_window(),
            queue_entry_ttl_secs: default_queue_ttl(),
            active_flag_ttl_secs: default_active_ttl(),
            media_channel_prefix: default_channel_prefix(),
        }
    }
}

fn default_session_duration() -> u32 {
    600
}

fn default_warning() -> u32 {
    120
}

fn default_rate_limit_max() -> u32 {
    5
}

fn default_rate_limit_window() -> u32 {
    60
}

fn default_queue_ttl() -> u64 {
    300
}

fn default_active_ttl() -> u64 {
    660
}

fn default_channel_prefix() -> String {
    "10mb".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MatchingConfig::default();
        assert_eq!(config.session_duration(), Duration::from_secs(600));
        assert_eq!(config.warning_secs, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_warning_must_fit_inside_session() {
        let config = MatchingConfig {
            warning_secs: 600,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidWarningThreshold));
    }

    #[test]
    fn test_active_ttl_must_cover_session() {
        let config = MatchingConfig {
            active_flag_ttl_secs: 600,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::ActiveFlagTtlTooShort));
    }

    #[test]
    fn test_zero_rate_limit_is_rejected() {
        let config = MatchingConfig {
            rate_limit_max_requests: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidRateLimit));
    }
}
