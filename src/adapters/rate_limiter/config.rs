//! Rate limit configuration.

use serde::{Deserialize, Serialize};

use crate::config::MatchingConfig;

/// Sliding-window limit shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests in any trailing window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_secs: 60,
        }
    }
}

impl From<&MatchingConfig> for RateLimitConfig {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            max_requests: config.rate_limit_max_requests,
            window_secs: config.rate_limit_window_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_five_per_minute() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 5);
        assert_eq!(config.window_secs, 60);
    }

    #[test]
    fn derives_from_matching_config() {
        let matching = MatchingConfig {
            rate_limit_max_requests: 3,
            rate_limit_window_secs: 10,
            ..MatchingConfig::default()
        };
        let config = RateLimitConfig::from(&matching);
        assert_eq!(config.max_requests, 3);
        assert_eq!(config.window_secs, 10);
    }
}
