//! Gateway error types.

use crate::chat::service::ServiceError;

use super::transport::TransportError;

/// Failure to deliver an event on one connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("send timed out")]
    Timeout,
}

/// Failure while handling one inbound event. Never fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid message status {0}")]
    InvalidStatus(u8),

    #[error("message service: {0}")]
    Service(#[from] ServiceError),

    #[error("delivery failed: {0}")]
    Send(#[from] ConnectionError),
}

/// Connector lifecycle and admission errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("connector already started")]
    AlreadyStarted,

    #[error("connection limit of {0} reached")]
    CapacityReached(usize),
}
