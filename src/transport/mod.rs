//! Publish/subscribe seam between the session and a broker.
//!
//! Every operation is fire-and-forget with at-most-once delivery. Inbound
//! messages are handed over through a channel and processed on a separate
//! task, so publishing never runs inbound handling on the caller's stack.

pub mod error;
pub mod memory;
pub mod mqtt;

pub use error::{ConnectError, TransportError};

use crate::config::BrokerAddress;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// Payload the broker publishes on the client's behalf when the connection
/// ends without a clean disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub client_id: String,
    pub broker: BrokerAddress,
    pub last_will: LastWill,
    pub keep_alive: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub struct Connection<T> {
    pub transport: T,
    pub inbound: mpsc::UnboundedReceiver<InboundMessage>,
}

pub trait Transport: Send + Sync + 'static {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError>;

    /// Clean disconnect. The broker discards the last will.
    fn disconnect(&self);
}

pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Connects with the last will from `options` already registered.
    fn connect(
        &self,
        options: ConnectOptions,
    ) -> impl Future<Output = Result<Connection<Self::Transport>, ConnectError>> + Send;
}
