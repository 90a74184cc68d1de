//! WebSocket Message Types
//!
//! Defines all message types for WebSocket communication between
//! dashboards and the VoltWay server. Every frame is a JSON object whose
//! `event` field names the message, matching the event names existing
//! dashboards listen for (`stationUpdate`, `getCurrentData`).

use serde::{Deserialize, Serialize};

use crate::station::DeviceState;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Ask for the current station state to be pushed again
    GetCurrentData,
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full station state
    StationUpdate(DeviceState),
    /// Pong response to ping
    Pong,
    /// Error message
    Error {
        /// Error description
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// An item queued for one subscriber's writer task
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A state snapshot
    State {
        snapshot: DeviceState,
        /// Explicitly requested by the client, so a repeat of the last
        /// written revision is still delivered
        requested: bool,
    },
    /// Any other server message, written as-is
    Message(ServerMessage),
}

impl Outbound {
    /// A snapshot fanned out by the broadcaster or sent as join catch-up
    pub fn broadcast(snapshot: DeviceState) -> Self {
        Outbound::State {
            snapshot,
            requested: false,
        }
    }

    /// A snapshot sent in reply to `getCurrentData`
    pub fn requested(snapshot: DeviceState) -> Self {
        Outbound::State {
            snapshot,
            requested: true,
        }
    }
}

impl From<ServerMessage> for Outbound {
    fn from(message: ServerMessage) -> Self {
        Outbound::Message(message)
    }
}

/// Keeps a subscriber's stream of snapshots in revision order.
///
/// Broadcast snapshots must be strictly newer than the last one written;
/// requested snapshots may repeat it. Anything older is stale and skipped.
#[derive(Debug, Default)]
pub struct RevisionFilter {
    last_written: Option<u64>,
}

impl RevisionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `outbound` should be written, recording it if so.
    pub fn admit(&mut self, outbound: Outbound) -> Option<ServerMessage> {
        match outbound {
            Outbound::Message(message) => Some(message),
            Outbound::State {
                snapshot,
                requested,
            } => {
                if let Some(last) = self.last_written {
                    let stale = if requested {
                        snapshot.revision < last
                    } else {
                        snapshot.revision <= last
                    };
                    if stale {
                        return None;
                    }
                }
                self.last_written = Some(snapshot.revision);
                Some(ServerMessage::StationUpdate(snapshot))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(revision: u64) -> DeviceState {
        let mut state = DeviceState::initial("ESP32_001", "Bay 1");
        state.revision = revision;
        state
    }

    #[test]
    fn test_client_message_deserialize_get_current_data() {
        let json = r#"{"event": "getCurrentData"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, ClientMessage::GetCurrentData);
    }

    #[test]
    fn test_client_message_deserialize_ping() {
        let json = r#"{"event": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_client_message_rejects_unknown_event() {
        let json = r#"{"event": "subscribe", "topics": []}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_server_message_serialize_station_update() {
        let msg = ServerMessage::StationUpdate(snapshot(3));
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["event"], "stationUpdate");
        assert_eq!(value["data"]["id"], "ESP32_001");
        assert_eq!(value["data"]["status"], "offline");
    }

    #[test]
    fn test_server_message_serialize_error() {
        let json = serde_json::to_string(&ServerMessage::error("bad frame")).unwrap();
        assert!(json.contains("\"event\":\"error\""));
        assert!(json.contains("\"message\":\"bad frame\""));
    }

    #[test]
    fn test_revision_filter_drops_stale_and_duplicate_broadcasts() {
        let mut filter = RevisionFilter::new();

        assert!(filter.admit(Outbound::broadcast(snapshot(2))).is_some());
        assert!(filter.admit(Outbound::broadcast(snapshot(2))).is_none());
        assert!(filter.admit(Outbound::broadcast(snapshot(1))).is_none());
        assert!(filter.admit(Outbound::broadcast(snapshot(3))).is_some());
        assert!(filter.admit(Outbound::requested(snapshot(2))).is_none());
    }

    #[test]
    fn test_revision_filter_allows_requested_repeat() {
        let mut filter = RevisionFilter::new();

        assert!(filter.admit(Outbound::broadcast(snapshot(5))).is_some());
        assert!(filter.admit(Outbound::requested(snapshot(5))).is_some());
        assert!(filter.admit(Outbound::requested(snapshot(4))).is_none());
        assert!(filter.admit(ServerMessage::Pong.into()).is_some());
    }
}
