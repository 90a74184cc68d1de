//! Subscriber Registry
//!
//! Tracks the dashboards currently connected to the push channel. Each
//! subscriber is a handle to a bounded per-connection queue; the registry is
//! the only long-lived owner of those handles, so removing a subscriber
//! closes its queue.

use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock, RwLockWriteGuard};

use super::messages::Outbound;

/// Unique identifier for a WebSocket connection
pub type SubscriberId = String;

/// Why a message could not be queued for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The subscriber's queue is full (slow consumer)
    QueueFull,
    /// The subscriber's writer has gone away (transport closed)
    Closed,
}

/// Handle to one connected consumer
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<Outbound>,
}

impl Subscriber {
    pub fn new(id: impl Into<SubscriberId>, sender: mpsc::Sender<Outbound>) -> Self {
        Self {
            id: id.into(),
            sender,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the connection's writer is still draining this queue
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue `outbound` without waiting.
    pub fn try_deliver(&self, outbound: Outbound) -> Result<(), DeliveryFailure> {
        self.sender.try_send(outbound).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryFailure::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }
}

/// The set of currently connected subscribers
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    ///
    /// Adding an id that is already present keeps the existing handle.
    pub async fn add(&self, subscriber: Subscriber) {
        self.try_add(subscriber, usize::MAX).await;
    }

    /// Register a subscriber unless `limit` subscribers are already present.
    ///
    /// The limit check and the insert happen under one write guard. Returns
    /// false if the subscriber was turned away.
    pub async fn try_add(&self, subscriber: Subscriber, limit: usize) -> bool {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.contains_key(&subscriber.id) {
            return true;
        }
        if subscribers.len() >= limit {
            return false;
        }
        subscribers.insert(subscriber.id.clone(), subscriber);
        true
    }

    /// Deregister a subscriber, returning whether it was present.
    pub async fn remove(&self, id: &str) -> bool {
        self.subscribers.write().await.remove(id).is_some()
    }

    /// Copy of the registered subscribers at call time
    pub async fn list(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.values().cloned().collect()
    }

    /// Look up a single subscriber
    pub async fn get(&self, id: &str) -> Option<Subscriber> {
        self.subscribers.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.subscribers.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    #[cfg(test)]
    pub(crate) async fn write_guard(&self) -> RwLockWriteGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::messages::ServerMessage;

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);

        registry.add(Subscriber::new("a", tx1)).await;
        registry.add(Subscriber::new("a", tx2)).await;
        assert_eq!(registry.len().await, 1);

        // The first handle is the one kept
        let subscriber = registry.get("a").await.unwrap();
        subscriber.try_deliver(ServerMessage::Pong.into()).unwrap();
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_try_add_respects_limit() {
        let registry = SubscriberRegistry::new();
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        let (tx3, _rx3) = mpsc::channel(4);

        assert!(registry.try_add(Subscriber::new("a", tx1.clone()), 2).await);
        assert!(registry.try_add(Subscriber::new("b", tx2), 2).await);
        assert!(!registry.try_add(Subscriber::new("c", tx3), 2).await);

        // Already present is not a new admission
        assert!(registry.try_add(Subscriber::new("a", tx1), 2).await);
        assert_eq!(registry.len().await, 2);
        assert!(!registry.contains("c").await);
    }

    #[tokio::test]
    async fn test_remove_is_noop_when_absent() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = mpsc::channel(4);

        registry.add(Subscriber::new("a", tx)).await;
        assert!(registry.remove("a").await);
        assert!(!registry.remove("a").await);
        assert!(!registry.remove("never-added").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_is_a_snapshot() {
        let registry = SubscriberRegistry::new();
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        registry.add(Subscriber::new("a", tx1)).await;
        let listed = registry.list().await;

        registry.add(Subscriber::new("b", tx2)).await;
        registry.remove("a").await;

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), "a");
        assert!(registry.contains("b").await);
        assert!(!registry.contains("a").await);
    }

    #[tokio::test]
    async fn test_delivery_failures() {
        let (tx, rx) = mpsc::channel(1);
        let subscriber = Subscriber::new("a", tx);

        assert!(subscriber.try_deliver(ServerMessage::Pong.into()).is_ok());
        assert_eq!(
            subscriber.try_deliver(ServerMessage::Pong.into()),
            Err(DeliveryFailure::QueueFull)
        );

        drop(rx);
        assert!(!subscriber.is_connected());
        assert_eq!(
            subscriber.try_deliver(ServerMessage::Pong.into()),
            Err(DeliveryFailure::Closed)
        );
    }
}
