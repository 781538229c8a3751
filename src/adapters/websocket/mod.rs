//! WebSocket adapter for the matchmaking protocol.
//!
//! ```text
//! client ──frame──> handler ──ClientMessage──> MatchCoordinator
//! client <──frame── handler <──MatchNotification── Notifier
//! ```
//!
//! - [`messages`] - wire format of both directions
//! - [`handler`] - axum upgrade handler and per-connection pump

pub mod handler;
pub mod messages;

pub use handler::{websocket_router, ws_handler, ConnectParams, WebSocketState};
pub use messages::{
    ClientMessage, EmptyMessage, ErrorMessage, FoundMessage, PartnerMessage, ProtocolError,
    SearchingMessage, ServerMessage, TimerSyncMessage,
};
