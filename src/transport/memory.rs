use super::{
    ConnectError, ConnectOptions, Connection, Connector, InboundMessage, LastWill, Transport,
    TransportError,
};
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};

/// In-process broker with the delivery model of a QoS 0 MQTT broker: every
/// subscriber of a topic, the publisher included, receives each message, and
/// a client that goes away without disconnecting triggers its last will.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Debug)]
struct BrokerInner {
    clients: DashMap<u64, ClientEntry>,
    topics: DashMap<String, Vec<u64>>,
    next_client: AtomicU64,
    reachable: AtomicBool,
}

impl Default for BrokerInner {
    fn default() -> Self {
        Self {
            clients: DashMap::new(),
            topics: DashMap::new(),
            next_client: AtomicU64::new(1),
            reachable: AtomicBool::new(true),
        }
    }
}

#[derive(Debug)]
struct ClientEntry {
    client_id: String,
    sender: UnboundedSender<InboundMessage>,
    last_will: LastWill,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unreachable, new connections fail. Existing ones keep working.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.len()
    }

    fn register(
        &self,
        options: ConnectOptions,
    ) -> Result<Connection<MemoryTransport>, ConnectError> {
        if !self.inner.reachable.load(Ordering::SeqCst) {
            return Err(ConnectError::Unreachable {
                broker: options.broker.to_string(),
                reason: "in-memory broker is offline".to_string(),
            });
        }
        let key = self.inner.next_client.fetch_add(1, Ordering::SeqCst);
        let (sender, inbound) = mpsc::unbounded_channel();
        self.inner.clients.insert(
            key,
            ClientEntry {
                client_id: options.client_id,
                sender,
                last_will: options.last_will,
            },
        );
        Ok(Connection {
            transport: MemoryTransport {
                broker: self.clone(),
                key,
                closed: AtomicBool::new(false),
            },
            inbound,
        })
    }

    fn subscribe(&self, key: u64, topic: &str) {
        let mut subscribers = self.inner.topics.entry(topic.to_string()).or_default();
        if !subscribers.contains(&key) {
            subscribers.push(key);
        }
    }

    fn publish(&self, topic: &str, payload: &str) {
        let subscribers = match self.inner.topics.get(topic) {
            Some(entry) => entry.value().clone(),
            None => return,
        };
        for key in subscribers {
            let Some(client) = self.inner.clients.get(&key) else { continue };
            let _ = client.sender.send(InboundMessage {
                topic: topic.to_string(),
                payload: payload.as_bytes().to_vec(),
            });
        }
    }

    fn remove_client(&self, key: u64) -> Option<ClientEntry> {
        let (_, entry) = self.inner.clients.remove(&key)?;
        for mut subscribers in self.inner.topics.iter_mut() {
            subscribers.retain(|subscriber| *subscriber != key);
        }
        Some(entry)
    }

    fn drop_client(&self, key: u64) {
        if let Some(entry) = self.remove_client(key) {
            tracing::debug!(client_id = %entry.client_id, "publishing last will");
            self.publish(&entry.last_will.topic, &entry.last_will.payload);
        }
    }
}

impl Connector for MemoryBroker {
    type Transport = MemoryTransport;

    fn connect(
        &self,
        options: ConnectOptions,
    ) -> impl Future<Output = Result<Connection<MemoryTransport>, ConnectError>> + Send {
        let result = self.register(options);
        async move { result }
    }
}

#[derive(Debug)]
pub struct MemoryTransport {
    broker: MemoryBroker,
    key: u64,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Ends the connection without a clean disconnect, as a killed process
    /// would.
    pub fn crash(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.broker.drop_client(self.key);
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.broker.subscribe(self.key, topic);
        Ok(())
    }

    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.broker.publish(topic, &payload);
        Ok(())
    }

    fn disconnect(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.broker.remove_client(self.key);
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.crash();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerAddress;
    use std::time::Duration;

    fn options(client_id: &str, topic: &str) -> ConnectOptions {
        ConnectOptions {
            client_id: client_id.to_string(),
            broker: BrokerAddress {
                host: "memory".to_string(),
                port: 0,
            },
            last_will: LastWill {
                topic: topic.to_string(),
                payload: format!("REMOVE:{client_id}"),
            },
            keep_alive: Duration::from_secs(60),
        }
    }

    fn drain(connection: &mut Connection<MemoryTransport>) -> Vec<String> {
        let mut payloads = Vec::new();
        while let Ok(message) = connection.inbound.try_recv() {
            payloads.push(String::from_utf8(message.payload).expect("utf8"));
        }
        payloads
    }

    #[tokio::test]
    async fn subscribers_including_sender_receive_messages() {
        let broker = MemoryBroker::new();
        let mut a = broker.connect(options("a", "t")).await.expect("connect a");
        let mut b = broker.connect(options("b", "t")).await.expect("connect b");
        a.transport.subscribe("t").expect("subscribe");
        b.transport.subscribe("t").expect("subscribe");

        a.transport.publish("t", "hello".to_string()).expect("publish");
        assert_eq!(drain(&mut a), vec!["hello"]);
        assert_eq!(drain(&mut b), vec!["hello"]);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let broker = MemoryBroker::new();
        let a = broker.connect(options("a", "one")).await.expect("connect a");
        let mut b = broker.connect(options("b", "two")).await.expect("connect b");
        a.transport.subscribe("one").expect("subscribe");
        b.transport.subscribe("two").expect("subscribe");

        a.transport.publish("one", "hello".to_string()).expect("publish");
        assert!(drain(&mut b).is_empty());
    }

    #[tokio::test]
    async fn crash_publishes_last_will_but_disconnect_does_not() {
        let broker = MemoryBroker::new();
        let a = broker.connect(options("a", "t")).await.expect("connect a");
        let b = broker.connect(options("b", "t")).await.expect("connect b");
        let mut observer = broker.connect(options("o", "t")).await.expect("connect o");
        a.transport.subscribe("t").expect("subscribe");
        b.transport.subscribe("t").expect("subscribe");
        observer.transport.subscribe("t").expect("subscribe");

        a.transport.crash();
        b.transport.disconnect();
        assert_eq!(drain(&mut observer), vec!["REMOVE:a"]);
        assert_eq!(broker.client_count(), 1);
        assert_eq!(
            a.transport.publish("t", "late".to_string()),
            Err(TransportError::Closed)
        );
    }

    #[tokio::test]
    async fn dropping_connection_counts_as_crash() {
        let broker = MemoryBroker::new();
        let mut observer = broker.connect(options("o", "t")).await.expect("connect o");
        observer.transport.subscribe("t").expect("subscribe");
        {
            let a = broker.connect(options("a", "t")).await.expect("connect a");
            a.transport.subscribe("t").expect("subscribe");
        }
        assert_eq!(drain(&mut observer), vec!["REMOVE:a"]);
    }

    #[tokio::test]
    async fn unreachable_broker_refuses_connections() {
        let broker = MemoryBroker::new();
        broker.set_reachable(false);
        let result = broker.connect(options("a", "t")).await;
        assert!(matches!(result, Err(ConnectError::Unreachable { .. })));
        assert_eq!(broker.client_count(), 0);
    }
}
