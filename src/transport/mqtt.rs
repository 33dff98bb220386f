use super::{
    ConnectError, ConnectOptions, Connection, Connector, InboundMessage, Transport, TransportError,
};
use rumqttc::{
    AsyncClient, ClientError, ConnectionError, Event, EventLoop, LastWill, MqttOptions, Outgoing,
    Packet, QoS,
};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_CAPACITY: usize = 64;
const MIN_KEEP_ALIVE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MqttConnector {
    pub connect_timeout: Duration,
    pub request_capacity: usize,
}

impl Default for MqttConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_capacity: DEFAULT_REQUEST_CAPACITY,
        }
    }
}

impl Connector for MqttConnector {
    type Transport = MqttTransport;

    fn connect(
        &self,
        options: ConnectOptions,
    ) -> impl Future<Output = Result<Connection<MqttTransport>, ConnectError>> + Send {
        let connect_timeout = self.connect_timeout;
        let request_capacity = self.request_capacity;
        async move {
            let broker = options.broker.to_string();
            let mut mqtt_options = MqttOptions::new(
                options.client_id,
                options.broker.host.clone(),
                options.broker.port,
            );
            mqtt_options
                .set_keep_alive(options.keep_alive.max(MIN_KEEP_ALIVE))
                .set_clean_session(true)
                .set_last_will(LastWill::new(
                    options.last_will.topic,
                    options.last_will.payload.into_bytes(),
                    QoS::AtMostOnce,
                    false,
                ));

            let (client, mut event_loop) = AsyncClient::new(mqtt_options, request_capacity);
            match tokio::time::timeout(connect_timeout, wait_for_connack(&mut event_loop)).await {
                Err(_) => {
                    return Err(ConnectError::Timeout {
                        broker,
                        after: connect_timeout,
                    })
                }
                Ok(Err(ConnectionError::ConnectionRefused(code))) => {
                    return Err(ConnectError::Rejected {
                        broker,
                        code: format!("{code:?}"),
                    })
                }
                Ok(Err(error)) => {
                    return Err(ConnectError::Unreachable {
                        broker,
                        reason: error.to_string(),
                    })
                }
                Ok(Ok(())) => {}
            }
            tracing::info!(broker = %broker, "mqtt connected");

            let (sender, inbound) = mpsc::unbounded_channel();
            tokio::spawn(pump_event_loop(event_loop, sender));
            Ok(Connection {
                transport: MqttTransport { client },
                inbound,
            })
        }
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = event_loop.poll().await? {
            return Ok(());
        }
    }
}

/// Runs until the client disconnects, every client handle is dropped, or
/// the connection fails. No reconnect is attempted.
async fn pump_event_loop(mut event_loop: EventLoop, inbound: UnboundedSender<InboundMessage>) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => break,
            Err(error) => {
                tracing::warn!(%error, "mqtt connection lost");
                break;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl Transport for MqttTransport {
    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(TransportError::from)
    }

    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.into_bytes())
            .map_err(TransportError::from)
    }

    fn disconnect(&self) {
        if let Err(error) = self.client.try_disconnect() {
            tracing::warn!(%error, "mqtt disconnect request failed");
        }
    }
}

impl From<ClientError> for TransportError {
    fn from(error: ClientError) -> Self {
        TransportError::Rejected {
            reason: error.to_string(),
        }
    }
}
