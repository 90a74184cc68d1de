//! WebSocket Real-Time Streaming
//!
//! Pushes the station state to dashboard clients as it changes.
//!
//! ## Architecture
//!
//! - **SubscriberRegistry**: The set of connected dashboards and their queues
//! - **ConnectionHub**: Admission control and fan-out of state snapshots
//! - **Handler**: WebSocket upgrade and per-connection lifecycle
//! - **Messages**: Client and server message formats
//!
//! ## Protocol
//!
//! Clients connect to `/ws`. The server immediately sends the current state,
//! then a new one after every accepted ingest:
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:3000/ws');
//!
//! ws.onopen = () => ws.send(JSON.stringify({event: 'getCurrentData'}));
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.event === 'stationUpdate') render(msg.data);
//! };
//! ```

mod handler;
mod hub;
mod messages;
mod registry;

pub use handler::{run_connection, websocket_handler, ConnectionPhase, Session};
pub use hub::{ConnectionHub, HubConfig, HubError};
pub use messages::{ClientMessage, Outbound, RevisionFilter, ServerMessage};
pub use registry::{DeliveryFailure, Subscriber, SubscriberId, SubscriberRegistry};
