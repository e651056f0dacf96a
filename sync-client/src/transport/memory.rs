//! In-memory broker and transport.
//!
//! A [`MemoryBroker`] behaves like a topic-based publish/subscribe service:
//! prefix subscriptions, retained messages per topic, and delivery to every
//! matching subscriber including the publisher. Transports created from the
//! same broker can talk to each other, which is enough to run several
//! devices in one process. Failure injection mirrors what a real network
//! does to the sync engine.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

#[derive(Debug)]
enum Delivery {
    Message(Vec<u8>),
    Closed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared in-memory broker.
#[derive(Debug, Default, Clone)]
pub struct MemoryBroker {
    inner: Arc<Mutex<BrokerInner>>,
}

#[derive(Debug, Default)]
struct BrokerInner {
    offline: bool,
    next_id: u64,
    subscribers: Vec<Subscriber>,
    retained: BTreeMap<String, Vec<u8>>,
    published: Vec<(String, Vec<u8>)>,
}

#[derive(Debug)]
struct Subscriber {
    transport: u64,
    filter: String,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl MemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport attached to this broker.
    pub fn transport(&self) -> MemoryTransport {
        let id = {
            let mut inner = lock(&self.inner);
            inner.next_id += 1;
            inner.next_id
        };
        let (tx, rx) = mpsc::unbounded_channel();
        MemoryTransport {
            id,
            broker: self.clone(),
            state: Arc::new(Mutex::new(TransportState::default())),
            tx,
            rx: Arc::new(AsyncMutex::new(rx)),
        }
    }

    /// Take the broker offline (new connections fail) or back online.
    pub fn set_online(&self, online: bool) {
        lock(&self.inner).offline = !online;
    }

    /// Publish from outside any transport.
    pub fn inject(&self, topic: &str, data: &[u8], retain: bool) {
        self.publish(topic, data, retain);
    }

    /// The retained message of a topic.
    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        lock(&self.inner).retained.get(topic).cloned()
    }

    /// Every publication so far, as `(topic, bytes)`.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.inner).published.clone()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }

    fn is_online(&self) -> bool {
        !lock(&self.inner).offline
    }

    fn publish(&self, topic: &str, data: &[u8], retain: bool) {
        let mut inner = lock(&self.inner);
        inner.published.push((topic.to_string(), data.to_vec()));
        if retain {
            inner.retained.insert(topic.to_string(), data.to_vec());
        }
        inner.subscribers.retain(|sub| {
            if !topic.starts_with(&sub.filter) {
                return true;
            }
            sub.tx.send(Delivery::Message(data.to_vec())).is_ok()
        });
    }

    fn subscribe(&self, transport: u64, filter: &str, tx: mpsc::UnboundedSender<Delivery>) {
        let mut inner = lock(&self.inner);
        inner.subscribers.retain(|sub| sub.transport != transport);
        for (topic, data) in &inner.retained {
            if topic.starts_with(filter) {
                let _ = tx.send(Delivery::Message(data.clone()));
            }
        }
        inner.subscribers.push(Subscriber {
            transport,
            filter: filter.to_string(),
            tx,
        });
    }

    fn unsubscribe(&self, transport: u64) {
        lock(&self.inner)
            .subscribers
            .retain(|sub| sub.transport != transport);
    }
}

/// A client connection to a [`MemoryBroker`].
///
/// Clones share the same connection.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    id: u64,
    broker: MemoryBroker,
    state: Arc<Mutex<TransportState>>,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Delivery>>>,
}

#[derive(Debug, Default)]
struct TransportState {
    connected: bool,
    connected_address: Option<String>,
    subscription: Option<String>,
    sent_messages: Vec<(String, Vec<u8>)>,
    fail_next_connect: Option<String>,
    fail_next_subscribe: Option<String>,
    fail_next_publish: Option<String>,
}

impl MemoryTransport {
    /// Get all messages this transport published, as `(topic, bytes)`.
    pub fn sent_messages(&self) -> Vec<(String, Vec<u8>)> {
        lock(&self.state).sent_messages.clone()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        lock(&self.state).connected_address.clone()
    }

    /// Get the active subscription filter.
    pub fn subscription(&self) -> Option<String> {
        lock(&self.state).subscription.clone()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        lock(&self.state).fail_next_connect = Some(error.to_string());
    }

    /// Cause the next subscribe() to fail with the given error.
    pub fn fail_next_subscribe(&self, error: &str) {
        lock(&self.state).fail_next_subscribe = Some(error.to_string());
    }

    /// Cause the next publish() to fail with the given error.
    pub fn fail_next_publish(&self, error: &str) {
        lock(&self.state).fail_next_publish = Some(error.to_string());
    }

    /// Simulate the broker dropping this connection.
    ///
    /// A pending or next `recv()` fails with `ConnectionClosed`.
    pub fn drop_connection(&self) {
        {
            let mut state = lock(&self.state);
            state.connected = false;
            state.subscription = None;
        }
        self.broker.unsubscribe(self.id);
        let _ = self.tx.send(Delivery::Closed);
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        // Forget anything queued by a previous connection
        {
            let mut rx = self.rx.lock().await;
            while rx.try_recv().is_ok() {}
        }

        let mut state = lock(&self.state);
        if let Some(error) = state.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }
        if !self.broker.is_online() {
            return Err(TransportError::ConnectionFailed(format!(
                "broker at {} unreachable",
                address
            )));
        }

        state.connected = true;
        state.connected_address = Some(address.to_string());
        Ok(())
    }

    async fn subscribe(&self, filter: &str) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            if let Some(error) = state.fail_next_subscribe.take() {
                return Err(TransportError::SubscribeFailed(error));
            }
            state.subscription = Some(filter.to_string());
        }
        self.broker.subscribe(self.id, filter, self.tx.clone());
        Ok(())
    }

    async fn publish(&self, topic: &str, data: &[u8], retain: bool) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.state);
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            if let Some(error) = state.fail_next_publish.take() {
                return Err(TransportError::SendFailed(error));
            }
            state.sent_messages.push((topic.to_string(), data.to_vec()));
        }
        self.broker.publish(topic, data, retain);
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(Delivery::Message(data)) => Ok(data),
            Some(Delivery::Closed) | None => Err(TransportError::ConnectionClosed),
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        {
            let mut state = lock(&self.state);
            state.connected = false;
            state.subscription = None;
        }
        self.broker.unsubscribe(self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn connected(broker: &MemoryBroker, filter: &str) -> MemoryTransport {
        let transport = broker.transport();
        transport.connect("memory://test").await.unwrap();
        transport.subscribe(filter).await.unwrap();
        transport
    }

    // ===========================================
    // Connection Tests
    // ===========================================

    #[tokio::test]
    async fn connects_and_records_address() {
        let broker = MemoryBroker::new();
        let transport = broker.transport();
        assert!(!transport.is_connected());

        transport.connect("memory://a").await.unwrap();

        assert!(transport.is_connected());
        assert_eq!(transport.connected_address(), Some("memory://a".to_string()));
    }

    #[tokio::test]
    async fn offline_broker_refuses_connections() {
        let broker = MemoryBroker::new();
        broker.set_online(false);
        let transport = broker.transport();

        let result = transport.connect("memory://a").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));

        broker.set_online(true);
        transport.connect("memory://a").await.unwrap();
    }

    #[tokio::test]
    async fn publish_requires_connection() {
        let broker = MemoryBroker::new();
        let transport = broker.transport();
        let result = transport.publish("t/", b"x", false).await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    // ===========================================
    // Delivery Tests
    // ===========================================

    #[tokio::test]
    async fn delivers_to_matching_subscribers_including_sender() {
        let broker = MemoryBroker::new();
        let a = connected(&broker, "app/room1/").await;
        let b = connected(&broker, "app/room1/").await;
        let other = connected(&broker, "app/room2/").await;

        a.publish("app/room1/", b"hi", false).await.unwrap();

        assert_eq!(a.recv().await.unwrap(), b"hi");
        assert_eq!(b.recv().await.unwrap(), b"hi");
        let nothing = tokio::time::timeout(Duration::from_millis(50), other.recv()).await;
        assert!(nothing.is_err(), "other room must not receive");
    }

    #[tokio::test]
    async fn retained_messages_reach_late_subscribers() {
        let broker = MemoryBroker::new();
        let a = connected(&broker, "app/room/").await;
        a.publish("app/room/broadcast", b"v1", true).await.unwrap();
        a.publish("app/room/broadcast", b"v2", true).await.unwrap();
        a.publish("app/room/", b"transient", false).await.unwrap();

        let late = connected(&broker, "app/room/").await;
        assert_eq!(late.recv().await.unwrap(), b"v2");
        assert_eq!(broker.retained("app/room/broadcast"), Some(b"v2".to_vec()));
        let nothing = tokio::time::timeout(Duration::from_millis(50), late.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn close_stops_delivery() {
        let broker = MemoryBroker::new();
        let a = connected(&broker, "app/room/").await;
        let b = connected(&broker, "app/room/").await;
        b.close().await.unwrap();
        assert_eq!(broker.subscriber_count(), 1);

        a.publish("app/room/", b"x", false).await.unwrap();
        assert!(matches!(b.recv().await, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn dropped_connection_fails_pending_recv() {
        let broker = MemoryBroker::new();
        let a = connected(&broker, "app/room/").await;

        let waiter = {
            let a = a.clone();
            tokio::spawn(async move { a.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        a.drop_connection();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(TransportError::ConnectionClosed)));
        assert!(!a.is_connected());
    }

    #[tokio::test]
    async fn reconnect_discards_stale_deliveries() {
        let broker = MemoryBroker::new();
        let a = connected(&broker, "app/room/").await;
        a.drop_connection();

        a.connect("memory://test").await.unwrap();
        a.subscribe("app/room/").await.unwrap();
        a.publish("app/room/", b"fresh", false).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), b"fresh");
    }

    // ===========================================
    // Failure Injection Tests
    // ===========================================

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let broker = MemoryBroker::new();
        let a = broker.transport();

        a.fail_next_connect("refused");
        assert!(a.connect("m").await.is_err());
        a.connect("m").await.unwrap();

        a.fail_next_subscribe("denied");
        assert!(matches!(
            a.subscribe("t/").await,
            Err(TransportError::SubscribeFailed(_))
        ));
        a.subscribe("t/").await.unwrap();

        a.fail_next_publish("full");
        assert!(matches!(
            a.publish("t/", b"x", false).await,
            Err(TransportError::SendFailed(_))
        ));
        a.publish("t/", b"x", false).await.unwrap();
        assert_eq!(a.sent_messages().len(), 1);
    }
}
