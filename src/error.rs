use std::net::SocketAddr;

use thiserror::Error;

use crate::decoder::Category;

/// Per-datagram decoding failure. Logged and dropped by the listeners,
/// never fatal.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty datagram")]
    Empty,

    #[error("protobuf: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

/// Failure delivering one record to one subscriber.
/// The subscriber is unregistered, others are not affected.
#[derive(Debug, Error)]
pub enum TransportSendError {
    #[error("send timed out")]
    Timeout,

    #[error("transport closed")]
    Closed,

    #[error("websocket: {0}")]
    WebSocket(String),
}

/// Startup errors: the process exits on any of these.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to bind {category} listener on {addr}: {source}")]
    Bind {
        category: Category,
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("http server: {0}")]
    Http(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Subscriber registration refused
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("subscriber limit reached ({max})")]
    MaxSubscribers { max: usize },
}
