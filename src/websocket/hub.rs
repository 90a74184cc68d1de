//! WebSocket Connection Hub
//!
//! Admits connections into the subscriber registry and fans station
//! snapshots out to every registered subscriber. Fan-out only enqueues onto
//! each subscriber's bounded queue; the connection's own writer task does the
//! network I/O, so one slow dashboard never holds up the others.

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::Outbound;
use super::registry::{DeliveryFailure, Subscriber, SubscriberId, SubscriberRegistry};
use crate::station::{DeviceState, StateStore};

/// Broadcasts station state to all connected dashboards
#[derive(Debug)]
pub struct ConnectionHub {
    registry: SubscriberRegistry,
    config: HubConfig,
}

/// Configuration for the connection hub
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Capacity of each subscriber's outbound queue. A subscriber whose
    /// queue fills up is disconnected.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_max_connections() -> usize {
    1000
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ConnectionHub {
    /// Create a new connection hub
    pub fn new(config: HubConfig) -> Self {
        Self {
            registry: SubscriberRegistry::new(),
            config,
        }
    }

    /// Register a new connection's queue
    ///
    /// Returns the connection ID on success, or an error if the connection
    /// limit has been reached.
    pub async fn register(&self, sender: mpsc::Sender<Outbound>) -> Result<SubscriberId, HubError> {
        let limit = self.config.max_connections;
        let id = Uuid::new_v4().to_string();

        if !self
            .registry
            .try_add(Subscriber::new(id.clone(), sender), limit)
            .await
        {
            return Err(HubError::TooManyConnections { limit });
        }

        tracing::info!(connection_id = %id, "WebSocket connected");
        Ok(id)
    }

    /// Register a new connection and queue the current state as its first
    /// message.
    ///
    /// Returns the connection ID and the receiving end of its queue.
    pub async fn join(
        &self,
        store: &StateStore,
    ) -> Result<(SubscriberId, mpsc::Receiver<Outbound>), HubError> {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let id = self.register(tx).await?;

        // Registered first: any publish racing with this read is either
        // already in the snapshot or queued behind it, and the writer's
        // revision filter drops whichever copy arrives second.
        let snapshot = store.get().await;
        self.send_to(&id, Outbound::broadcast(snapshot)).await?;

        Ok((id, rx))
    }

    /// Remove a connection; safe to call more than once
    pub async fn unregister(&self, id: &str) -> bool {
        let removed = self.registry.remove(id).await;
        if removed {
            tracing::info!(connection_id = %id, "WebSocket disconnected");
        }
        removed
    }

    /// Push `state` to every subscriber registered at call time.
    ///
    /// Never fails: subscribers that cannot take the message are logged and
    /// removed. Returns the number of subscribers the state was queued for.
    pub async fn publish(&self, state: &DeviceState) -> usize {
        let subscribers = self.registry.list().await;

        let mut delivered = 0;
        let mut failed = Vec::new();

        for subscriber in &subscribers {
            match subscriber.try_deliver(Outbound::broadcast(state.clone())) {
                Ok(()) => delivered += 1,
                Err(failure) => failed.push((subscriber.id().to_string(), failure)),
            }
        }

        for (id, failure) in failed {
            self.drop_subscriber(&id, failure).await;
        }

        tracing::trace!(
            revision = state.revision,
            subscribers = delivered,
            "Broadcast station update"
        );

        delivered
    }

    /// Send a message directly to a specific connection
    pub async fn send_to(&self, id: &str, outbound: Outbound) -> Result<(), HubError> {
        let subscriber = self
            .registry
            .get(id)
            .await
            .ok_or(HubError::ConnectionNotFound)?;

        match subscriber.try_deliver(outbound) {
            Ok(()) => Ok(()),
            Err(failure) => {
                self.drop_subscriber(id, failure).await;
                Err(failure.into())
            }
        }
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    /// Whether a connection is still registered
    pub async fn is_registered(&self, id: &str) -> bool {
        self.registry.contains(id).await
    }

    /// Hold the subscriber set exclusively, stalling fan-out and admission
    #[cfg(test)]
    pub(crate) async fn lock_subscribers(
        &self,
    ) -> tokio::sync::RwLockWriteGuard<'_, std::collections::HashMap<SubscriberId, Subscriber>>
    {
        self.registry.write_guard().await
    }

    async fn drop_subscriber(&self, id: &str, failure: DeliveryFailure) {
        match failure {
            DeliveryFailure::QueueFull => tracing::warn!(
                connection_id = %id,
                capacity = self.config.queue_capacity,
                "Subscriber queue full, disconnecting slow consumer"
            ),
            DeliveryFailure::Closed => tracing::debug!(
                connection_id = %id,
                "Subscriber transport closed, removing"
            ),
        }
        self.unregister(id).await;
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

/// Errors that can occur in the connection hub
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {limit})")]
    TooManyConnections { limit: usize },

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Subscriber queue full")]
    QueueFull,

    #[error("Subscriber connection closed")]
    Closed,
}

impl From<DeliveryFailure> for HubError {
    fn from(failure: DeliveryFailure) -> Self {
        match failure {
            DeliveryFailure::QueueFull => HubError::QueueFull,
            DeliveryFailure::Closed => HubError::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::{StationStatus, StationUpdate};
    use crate::websocket::messages::ServerMessage;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn state_of(outbound: Outbound) -> DeviceState {
        match outbound {
            Outbound::State { snapshot, .. } => snapshot,
            other => panic!("Expected state, got {:?}", other),
        }
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.queue_capacity, 64);
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let hub = ConnectionHub::default();
        let (tx, _rx) = mpsc::channel(8);

        let id = hub.register(tx).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(hub.connection_count().await, 1);

        assert!(hub.unregister(&id).await);
        assert!(!hub.unregister(&id).await);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let hub = ConnectionHub::new(HubConfig {
            max_connections: 2,
            queue_capacity: 4,
        });

        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        let (tx3, _rx3) = mpsc::channel(4);

        hub.register(tx1).await.unwrap();
        hub.register(tx2).await.unwrap();
        let result = hub.register(tx3).await;

        assert_eq!(result, Err(HubError::TooManyConnections { limit: 2 }));
        assert_eq!(hub.connection_count().await, 2);
    }

    #[tokio::test]
    async fn test_join_queues_current_state_first() {
        let hub = ConnectionHub::default();
        let store = StateStore::new("ESP32_001", "Bay 1");
        let current = store
            .merge(StationUpdate::new("ESP32_001", StationStatus::Charging).battery_level(42.0))
            .await
            .unwrap();

        let (id, mut rx) = hub.join(&store).await.unwrap();

        assert!(hub.is_registered(&id).await);
        assert_eq!(state_of(rx.try_recv().unwrap()), current);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = ConnectionHub::default();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        hub.register(tx1).await.unwrap();
        hub.register(tx2).await.unwrap();

        let mut state = DeviceState::initial("ESP32_001", "Bay 1");
        state.revision = 1;

        assert_eq!(hub.publish(&state).await, 2);
        assert_eq!(state_of(rx1.try_recv().unwrap()), state);
        assert_eq!(state_of(rx2.try_recv().unwrap()), state);
    }

    #[tokio::test]
    async fn test_failed_subscriber_does_not_block_others() {
        let hub = ConnectionHub::default();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, rx_b) = mpsc::channel(8);
        let id_a = hub.register(tx_a).await.unwrap();
        let id_b = hub.register(tx_b).await.unwrap();

        // B's transport has gone away
        drop(rx_b);

        let state = DeviceState::initial("ESP32_001", "Bay 1");
        assert_eq!(hub.publish(&state).await, 1);

        assert_eq!(state_of(rx_a.try_recv().unwrap()), state);
        assert!(hub.is_registered(&id_a).await);
        assert!(!hub.is_registered(&id_b).await);
    }

    #[tokio::test]
    async fn test_slow_consumer_is_disconnected_on_overflow() {
        let hub = ConnectionHub::new(HubConfig {
            max_connections: 10,
            queue_capacity: 2,
        });
        let (tx_fast, mut rx_fast) = mpsc::channel(16);
        let (tx_slow, mut rx_slow) = mpsc::channel(2);
        let fast = hub.register(tx_fast).await.unwrap();
        let slow = hub.register(tx_slow).await.unwrap();

        let mut state = DeviceState::initial("ESP32_001", "Bay 1");
        for revision in 1..=3 {
            state.revision = revision;
            hub.publish(&state).await;
        }

        assert!(hub.is_registered(&fast).await);
        assert!(!hub.is_registered(&slow).await);

        // The slow queue keeps what it had, then closes
        assert_eq!(state_of(rx_slow.recv().await.unwrap()).revision, 1);
        assert_eq!(state_of(rx_slow.recv().await.unwrap()).revision, 2);
        assert!(rx_slow.recv().await.is_none());

        for revision in 1..=3 {
            assert_eq!(state_of(rx_fast.try_recv().unwrap()).revision, revision);
        }
    }

    #[tokio::test]
    async fn test_publish_order_per_subscriber() {
        let hub = ConnectionHub::default();
        let store = StateStore::new("ESP32_001", "Bay 1");
        let (_id, mut rx) = hub.join(&store).await.unwrap();
        let _catch_up = rx.try_recv().unwrap();

        for level in [10.0, 20.0, 30.0] {
            let state = store
                .merge(
                    StationUpdate::new("ESP32_001", StationStatus::Charging).battery_level(level),
                )
                .await
                .unwrap();
            hub.publish(&state).await;
        }

        let observed: Vec<f64> = (0..3)
            .map(|_| state_of(rx.try_recv().unwrap()).battery_level)
            .collect();
        assert_eq!(observed, vec![10.0, 20.0, 30.0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_never_exceed_limit() {
        let hub = Arc::new(ConnectionHub::new(HubConfig {
            max_connections: 1,
            queue_capacity: 4,
        }));
        let store = Arc::new(StateStore::default());

        let mut handles = Vec::new();
        for _ in 0..32 {
            let hub = Arc::clone(&hub);
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                hub.join(&store).await.map(|(_, rx)| rx)
            }));
        }

        let mut admitted = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(rx) => admitted.push(rx),
                Err(e) => assert_eq!(e, HubError::TooManyConnections { limit: 1 }),
            }
        }

        assert_eq!(admitted.len(), 1);
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_steady_subscriber_sees_every_revision_amid_churn() {
        const UPDATES: u32 = 200;

        let hub = Arc::new(ConnectionHub::new(HubConfig {
            max_connections: 100,
            queue_capacity: 512,
        }));
        let store = Arc::new(StateStore::new("ESP32_001", "Bay 1"));
        let (steady_id, mut steady) = hub.join(&store).await.unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::new();

        // Dashboards joining and leaving while updates are fanned out
        for _ in 0..8 {
            let hub = Arc::clone(&hub);
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            workers.push(tokio::spawn(async move {
                while !done.load(Ordering::Relaxed) {
                    let (id, rx) = hub.join(&store).await.unwrap();
                    tokio::task::yield_now().await;
                    hub.unregister(&id).await;
                    drop(rx);
                }
            }));
        }

        // Readers never see a half-merged state
        for _ in 0..2 {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            workers.push(tokio::spawn(async move {
                let mut last = 0;
                while !done.load(Ordering::Relaxed) {
                    let state = store.get().await;
                    assert_eq!(u64::from(state.charging_time), state.revision);
                    assert!(state.revision >= last);
                    last = state.revision;
                    tokio::task::yield_now().await;
                }
            }));
        }

        for minutes in 1..=UPDATES {
            let state = store
                .merge(
                    StationUpdate::new("ESP32_001", StationStatus::Charging)
                        .charging_time(minutes),
                )
                .await
                .unwrap();
            hub.publish(&state).await;
            if minutes % 16 == 0 {
                tokio::task::yield_now().await;
            }
        }

        done.store(true, Ordering::Relaxed);
        for worker in workers {
            worker.await.unwrap();
        }

        assert!(hub.is_registered(&steady_id).await);

        let mut revisions = Vec::new();
        while let Ok(outbound) = steady.try_recv() {
            revisions.push(state_of(outbound).revision);
        }
        assert_eq!(revisions, (0..=u64::from(UPDATES)).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_send_to_unknown_connection() {
        let hub = ConnectionHub::default();
        let result = hub.send_to("missing", ServerMessage::Pong.into()).await;
        assert_eq!(result, Err(HubError::ConnectionNotFound));
    }
}
