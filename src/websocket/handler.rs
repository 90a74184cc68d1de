//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle:
//! Connecting → Connected → Disconnected. On entering Connected the current
//! station state is pushed to the new dashboard; while connected a
//! `getCurrentData` request re-pushes it to that dashboard only.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::hub::{ConnectionHub, HubError};
use super::messages::{ClientMessage, Outbound, RevisionFilter, ServerMessage};
use super::registry::SubscriberId;
use crate::api::AppState;
use crate::station::StateStore;

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.ws_hub);
    let store = Arc::clone(&state.store);
    ws.on_upgrade(move |socket| handle_socket(socket, hub, store))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>, store: Arc<StateStore>) {
    let (sender, receiver) = socket.split();
    run_connection(sender, receiver, hub, store).await;
}

/// Lifecycle phase of a push-channel connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Connected,
    Disconnected,
}

/// One dashboard's membership in the hub
///
/// `disconnect` may be reached from several triggers (client close, transport
/// error, hub-side removal); only the first one has any effect.
#[derive(Debug)]
pub struct Session {
    hub: Arc<ConnectionHub>,
    id: Option<SubscriberId>,
    phase: ConnectionPhase,
}

impl Session {
    pub fn new(hub: Arc<ConnectionHub>) -> Self {
        Self {
            hub,
            id: None,
            phase: ConnectionPhase::Connecting,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Join the hub and queue the catch-up push.
    ///
    /// Returns the receiving end of this connection's outbound queue.
    pub async fn connect(&mut self, store: &StateStore) -> Result<mpsc::Receiver<Outbound>, HubError> {
        if self.phase != ConnectionPhase::Connecting {
            return Err(HubError::Closed);
        }

        match self.hub.join(store).await {
            Ok((id, rx)) => {
                self.id = Some(id);
                self.phase = ConnectionPhase::Connected;
                Ok(rx)
            }
            Err(e) => {
                self.phase = ConnectionPhase::Disconnected;
                Err(e)
            }
        }
    }

    /// Leave the hub. Returns false if already disconnected.
    pub async fn disconnect(&mut self) -> bool {
        if self.phase == ConnectionPhase::Disconnected {
            return false;
        }
        self.phase = ConnectionPhase::Disconnected;

        if let Some(id) = &self.id {
            self.hub.unregister(id).await;
        }
        true
    }
}

/// Drive one connection over any WebSocket-shaped sink/stream pair
pub async fn run_connection<S, R, E>(
    mut sender: S,
    mut receiver: R,
    hub: Arc<ConnectionHub>,
    store: Arc<StateStore>,
) where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let mut session = Session::new(Arc::clone(&hub));

    let rx = match session.connect(&store).await {
        Ok(rx) => rx,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register WebSocket connection");
            if let Ok(text) = serde_json::to_string(&ServerMessage::error(e.to_string())) {
                let _ = sender.send(Message::Text(text)).await;
            }
            let _ = sender.close().await;
            return;
        }
    };

    let connection_id = match session.id() {
        Some(id) => id.to_string(),
        None => return,
    };

    // Task to forward queued messages to the WebSocket
    let mut send_task = tokio::spawn(write_outbound(sender, rx, connection_id.clone()));

    let hub_for_recv = Arc::clone(&hub);
    let conn_id_for_recv = connection_id.clone();

    // Task to receive messages from the WebSocket and handle them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, &store, &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    session.disconnect().await;
}

/// Drain a connection's queue onto the socket, in revision order
async fn write_outbound<S>(mut sender: S, mut rx: mpsc::Receiver<Outbound>, connection_id: String)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut filter = RevisionFilter::new();

    while let Some(outbound) = rx.recv().await {
        let Some(message) = filter.admit(outbound) else {
            tracing::trace!(connection_id = %connection_id, "Skipped stale snapshot");
            continue;
        };

        match serde_json::to_string(&message) {
            Ok(text) => {
                if let Err(e) = sender.send(Message::Text(text)).await {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "WebSocket send failed, closing connection"
                    );
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
            }
        }
    }

    let _ = sender.close().await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(
    hub: &ConnectionHub,
    store: &StateStore,
    connection_id: &str,
    message: Message,
) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(hub, store, connection_id, client_msg).await;
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        text = %text,
                        "Invalid client message"
                    );
                    // Keep the connection open
                    let error_msg = ServerMessage::error(format!("Invalid message format: {}", e));
                    let _ = hub.send_to(connection_id, error_msg.into()).await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let error_msg = ServerMessage::error("Binary messages not supported");
            let _ = hub.send_to(connection_id, error_msg.into()).await;
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
async fn handle_client_message(
    hub: &ConnectionHub,
    store: &StateStore,
    connection_id: &str,
    message: ClientMessage,
) {
    let outbound = match message {
        ClientMessage::GetCurrentData => Outbound::requested(store.get().await),
        ClientMessage::Ping => ServerMessage::Pong.into(),
    };

    if let Err(e) = hub.send_to(connection_id, outbound).await {
        tracing::debug!(
            connection_id = %connection_id,
            error = %e,
            "Failed to queue reply"
        );
    }
}
