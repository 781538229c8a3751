//! Redis key naming for matchmaking state.
//!
//! Format: `{prefix}:{entity}[:{identifier}]`

use crate::domain::foundation::UserId;

pub const DEFAULT_PREFIX: &str = "match";

#[derive(Debug, Clone)]
pub struct MatchKeys {
    prefix: String,
}

impl MatchKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Sorted set of waiting identities scored by enqueue sequence: `match:queue`
    pub fn queue(&self) -> String {
        format!("{}:queue", self.prefix)
    }

    /// Monotonic enqueue counter: `match:queue:seq`
    pub fn queue_seq(&self) -> String {
        format!("{}:queue:seq", self.prefix)
    }

    /// Serialized waiting entry: `match:user:{id}`
    pub fn entry(&self, user: &UserId) -> String {
        format!("{}:user:{}", self.prefix, user)
    }

    /// Active-session flag: `match:active:{id}`
    pub fn active(&self, user: &UserId) -> String {
        format!("{}:active:{}", self.prefix, user)
    }

    /// Lease held by the one server using this prefix: `match:instance`
    pub fn instance(&self) -> String {
        format!("{}:instance", self.prefix)
    }
}

impl Default for MatchKeys {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
