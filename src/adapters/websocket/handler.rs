//! WebSocket upgrade handler for matchmaking connections.
//!
//! Connection lifecycle:
//! 1. Read the credential from `?token=` or an `Authorization: Bearer` header
//! 2. Upgrade, then authenticate through the coordinator
//! 3. On failure send `match:error` and close
//! 4. Pump coordinator notifications out and client events in
//! 5. Tear down through `MatchCoordinator::disconnect`

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use futures::{stream::SplitSink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use crate::adapters::http::middleware::bearer_token;
use crate::application::matching::MatchCoordinator;
use crate::domain::foundation::ConnectionId;

use super::messages::{ClientMessage, ServerMessage};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub coordinator: Arc<MatchCoordinator>,
}

impl WebSocketState {
    pub fn new(coordinator: Arc<MatchCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws`
///
/// Authentication happens after the upgrade so a rejected client still
/// receives a `match:error` frame explaining why.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<WebSocketState>,
) -> Response {
    let credential = params
        .token
        .or_else(|| bearer_token(&headers).map(str::to_owned));

    ws.on_upgrade(move |socket| handle_socket(socket, credential, state))
}

async fn handle_socket(socket: WebSocket, credential: Option<String>, state: WebSocketState) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();

    let connection = match state
        .coordinator
        .connect(credential.as_deref(), outbound_tx)
        .await
    {
        Ok((connection, _)) => connection,
        Err(e) => {
            let _ = send_message(&mut sender, &ServerMessage::error(e.client_message())).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    // Forward coordinator notifications to the client
    let mut send_task = tokio::spawn(async move {
        while let Some(notification) = outbound_rx.recv().await {
            let msg = ServerMessage::from(notification);
            if let Err(e) = send_message(&mut sender, &msg).await {
                tracing::debug!(connection_id = %connection, "Send error, closing connection: {}", e);
                break;
            }
        }
    });

    // Dispatch client events
    let coordinator = state.coordinator.clone();
    let (stop_tx, stop_rx) = oneshot::channel();
    let mut recv_task = tokio::spawn(async move {
        pump_client_events(receiver, &coordinator, &connection, stop_rx).await;
    });

    // Wait for either side to finish. The receive side is stopped between
    // frames rather than aborted, so an event already being handled completes
    // before the connection is torn down.
    tokio::select! {
        _ = &mut send_task => {
            let _ = stop_tx.send(());
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
    }

    state.coordinator.disconnect(&connection).await;
}

/// Dispatches client frames until the stream ends, the client closes or
/// `stop` fires. `stop` is only observed while waiting for the next frame.
async fn pump_client_events<S>(
    mut receiver: S,
    coordinator: &MatchCoordinator,
    connection: &ConnectionId,
    mut stop: oneshot::Receiver<()>,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let result = tokio::select! {
            _ = &mut stop => break,
            next = receiver.next() => match next {
                Some(result) => result,
                None => break,
            },
        };

        match result {
            Ok(Message::Text(text)) => dispatch(coordinator, connection, &text).await,
            Ok(Message::Binary(_)) => {
                tracing::warn!(connection_id = %connection, "Received unsupported binary message");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %connection, "Client sent close frame");
                break;
            }
            Err(e) => {
                tracing::debug!(connection_id = %connection, "Receive error: {}", e);
                break;
            }
        }
    }
}

async fn dispatch(coordinator: &MatchCoordinator, connection: &ConnectionId, text: &str) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(connection_id = %connection, error = %e, "Ignoring client message");
            return;
        }
    };

    let result = match message {
        ClientMessage::Start { interests } => coordinator.start_match(connection, interests).await,
        ClientMessage::Cancel => coordinator.cancel_match(connection).await.map(|_| ()),
        ClientMessage::Leave => coordinator.leave_match(connection).await.map(|_| ()),
        ClientMessage::Online => coordinator.mark_online(connection).await,
    };

    if let Err(e) = result {
        tracing::debug!(connection_id = %connection, error = %e, "Client event not completed");
    }
}

/// Send a JSON message over the WebSocket.
async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json)).await
}

/// Router exposing `GET /ws`.
pub fn websocket_router(state: WebSocketState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}
