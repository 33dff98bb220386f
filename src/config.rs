use crate::game::constants::{
    GLOBAL_BUCKET_SECS, GLOBAL_FOOD_COUNT, GLOBAL_SMOOTHING, ROOM_BUCKET_SECS, ROOM_FOOD_COUNT,
    ROOM_SMOOTHING,
};
use std::env;
use std::time::Duration;

pub const DEFAULT_BROKER_HOST: &str = "broker.emqx.io";
pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_TOPIC_PREFIX: &str = "circle-arena/v1/room_";
pub const GLOBAL_TOPIC_SUFFIX: &str = "global";

/// Which flavour of shared world the peer takes part in.
///
/// `Rooms` isolates every room token on its own topic and seeds food with the
/// token. `Global` puts everyone on one topic with a time-only seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Rooms,
    Global,
}

impl Variant {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rooms" | "room" => Some(Self::Rooms),
            "global" => Some(Self::Global),
            _ => None,
        }
    }

    pub fn bucket_duration(self) -> Duration {
        match self {
            Self::Rooms => Duration::from_secs(ROOM_BUCKET_SECS),
            Self::Global => Duration::from_secs(GLOBAL_BUCKET_SECS),
        }
    }

    pub fn food_count(self) -> usize {
        match self {
            Self::Rooms => ROOM_FOOD_COUNT,
            Self::Global => GLOBAL_FOOD_COUNT,
        }
    }

    pub fn smoothing(self) -> f64 {
        match self {
            Self::Rooms => ROOM_SMOOTHING,
            Self::Global => GLOBAL_SMOOTHING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Mqtt,
    Memory,
}

impl TransportKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mqtt" => Some(Self::Mqtt),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub broker: BrokerAddress,
    pub topic_prefix: String,
    pub room: Option<String>,
    pub variant: Variant,
    pub transport: TransportKind,
    pub keep_alive: Duration,
    pub status_interval: Duration,
    pub local_peers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerAddress {
                host: DEFAULT_BROKER_HOST.to_string(),
                port: DEFAULT_BROKER_PORT,
            },
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            room: None,
            variant: Variant::Rooms,
            transport: TransportKind::Mqtt,
            keep_alive: Duration::from_secs(60),
            status_interval: Duration::from_secs(5),
            local_peers: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = non_empty("ARENA_BROKER_HOST").unwrap_or(defaults.broker.host);
        let port = non_empty("ARENA_BROKER_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(defaults.broker.port);
        let variant = non_empty("ARENA_VARIANT")
            .and_then(|value| Variant::parse(&value))
            .unwrap_or(defaults.variant);
        let transport = non_empty("ARENA_TRANSPORT")
            .and_then(|value| TransportKind::parse(&value))
            .unwrap_or(defaults.transport);
        let keep_alive = non_empty("ARENA_KEEP_ALIVE_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.keep_alive);
        let status_interval = non_empty("ARENA_STATUS_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.status_interval);
        let local_peers = non_empty("ARENA_LOCAL_PEERS")
            .and_then(|value| value.parse::<usize>().ok())
            .map(|count| count.max(1))
            .unwrap_or(defaults.local_peers);

        Self {
            broker: BrokerAddress { host, port },
            topic_prefix: non_empty("ARENA_TOPIC_PREFIX").unwrap_or(defaults.topic_prefix),
            room: non_empty("ARENA_ROOM"),
            variant,
            transport,
            keep_alive,
            status_interval,
            local_peers,
        }
    }
}
