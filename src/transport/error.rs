use std::time::Duration;
use thiserror::Error;

/// Reasons a connection attempt never reached the subscribed state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("broker {broker} is unreachable: {reason}")]
    Unreachable { broker: String, reason: String },

    #[error("broker {broker} did not acknowledge the connection within {after:?}")]
    Timeout { broker: String, after: Duration },

    #[error("broker {broker} refused the connection: {code}")]
    Rejected { broker: String, code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport connection is closed")]
    Closed,

    #[error("transport rejected the request: {reason}")]
    Rejected { reason: String },
}
