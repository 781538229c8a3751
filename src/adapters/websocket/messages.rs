//! WebSocket message types for the matchmaking protocol.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}`:
//! - Server → Client: `match:*` notifications
//! - Client → Server: `match:start`, `match:cancel`, `match:leave`, `user:online`

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::matching::{MatchFound, MatchNotification, PartnerProfile};

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "match:searching")]
    Searching(SearchingMessage),

    #[serde(rename = "match:found")]
    Found(FoundMessage),

    #[serde(rename = "match:error")]
    Error(ErrorMessage),

    #[serde(rename = "match:cancelled")]
    Cancelled(EmptyMessage),

    #[serde(rename = "match:timer_sync")]
    TimerSync(TimerSyncMessage),

    #[serde(rename = "match:timer_warning")]
    TimerWarning(EmptyMessage),

    #[serde(rename = "match:timer_end")]
    TimerEnd(EmptyMessage),

    #[serde(rename = "match:partner_left")]
    PartnerLeft(EmptyMessage),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorMessage {
            message: message.into(),
        })
    }
}

/// Payload for events that carry nothing; serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyMessage {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchingMessage {
    pub waiting_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundMessage {
    pub session_id: String,
    pub partner_id: String,
    pub partner: PartnerMessage,
    pub common_interests: Vec<String>,
    pub media_channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerMessage {
    pub nickname: Option<String>,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSyncMessage {
    pub remaining_seconds: u32,
}

impl From<PartnerProfile> for PartnerMessage {
    fn from(profile: PartnerProfile) -> Self {
        Self {
            nickname: profile.nickname,
            interests: profile.interests,
        }
    }
}

impl From<MatchFound> for FoundMessage {
    fn from(found: MatchFound) -> Self {
        Self {
            session_id: found.session_id.to_string(),
            partner_id: found.partner_id.to_string(),
            partner: found.partner.into(),
            common_interests: found.common_interests,
            media_channel_id: found.media_channel_id,
        }
    }
}

impl From<MatchNotification> for ServerMessage {
    fn from(notification: MatchNotification) -> Self {
        match notification {
            MatchNotification::Searching { waiting_count } => {
                ServerMessage::Searching(SearchingMessage { waiting_count })
            }
            MatchNotification::Found(found) => ServerMessage::Found(found.into()),
            MatchNotification::Error { message } => ServerMessage::error(message),
            MatchNotification::Cancelled => ServerMessage::Cancelled(EmptyMessage {}),
            MatchNotification::TimerSync { remaining_seconds } => {
                ServerMessage::TimerSync(TimerSyncMessage { remaining_seconds })
            }
            MatchNotification::TimerWarning => ServerMessage::TimerWarning(EmptyMessage {}),
            MatchNotification::TimerEnd => ServerMessage::TimerEnd(EmptyMessage {}),
            MatchNotification::PartnerLeft => ServerMessage::PartnerLeft(EmptyMessage {}),
        }
    }
}

// ============================================
// Client → Server Messages
// ============================================

/// Messages that clients can send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Enter the queue with these interest tags.
    Start { interests: Vec<String> },
    Cancel,
    Leave,
    /// Presence heartbeat.
    Online,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize, Default)]
struct StartData {
    #[serde(default)]
    interests: Vec<String>,
}

impl ClientMessage {
    /// Parses a text frame. `data` is optional for every event.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        match envelope.event.as_str() {
            "match:start" => {
                let data = if envelope.data.is_null() {
                    StartData::default()
                } else {
                    serde_json::from_value(envelope.data)
                        .map_err(|e| ProtocolError::Malformed(e.to_string()))?
                };
                Ok(ClientMessage::Start {
                    interests: data.interests,
                })
            }
            "match:cancel" => Ok(ClientMessage::Cancel),
            "match:leave" => Ok(ClientMessage::Leave),
            "user:online" => Ok(ClientMessage::Online),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}
