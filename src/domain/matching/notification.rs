//! Outbound events delivered to connected participants.
//!
//! These are transport-agnostic; the websocket adapter owns the wire format.

use crate::domain::foundation::{SessionId, UserId};

/// What a participant sees about their partner in `match:found`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartnerProfile {
    pub nickname: Option<String>,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFound {
    pub session_id: SessionId,
    pub partner_id: UserId,
    pub partner: PartnerProfile,
    pub common_interests: Vec<String>,
    pub media_channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchNotification {
    /// Still waiting; carries the current queue size.
    Searching { waiting_count: usize },
    Found(MatchFound),
    Error { message: String },
    Cancelled,
    TimerSync { remaining_seconds: u32 },
    TimerWarning,
    TimerEnd,
    PartnerLeft,
}

impl MatchNotification {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Event name as it appears on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            MatchNotification::Searching { .. } => "match:searching",
            MatchNotification::Found(_) => "match:found",
            MatchNotification::Error { .. } => "match:error",
            MatchNotification::Cancelled => "match:cancelled",
            MatchNotification::TimerSync { .. } => "match:timer_sync",
            MatchNotification::TimerWarning => "match:timer_warning",
            MatchNotification::TimerEnd => "match:timer_end",
            MatchNotification::PartnerLeft => "match:partner_left",
        }
    }
}

/// Events produced by a running session countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed; `remaining_seconds` counts down to 0.
    Tick { remaining_seconds: u32 },
    /// Remaining time reached the warning threshold.
    Warning,
    /// Countdown finished. Always the last event.
    Ended,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_wire_protocol() {
        assert_eq!(
            MatchNotification::Searching { waiting_count: 1 }.event_name(),
            "match:searching"
        );
        assert_eq!(MatchNotification::error("x").event_name(), "match:error");
        assert_eq!(
            MatchNotification::TimerSync { remaining_seconds: 3 }.event_name(),
            "match:timer_sync"
        );
        assert_eq!(MatchNotification::PartnerLeft.event_name(), "match:partner_left");
    }
}
