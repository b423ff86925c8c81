//! Error types for the signal relay

use thiserror::Error;

use crate::types::Role;

/// Failure of a single connection's transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("write timed out after {0} ms")]
    WriteTimeout(u64),

    #[error("websocket error: {0}")]
    WebSocket(String),
}

/// Why a frame could not be forwarded to the other role
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForwardError {
    #[error("peer not connected")]
    PeerAbsent,

    #[error("write to peer failed: {0}")]
    PeerWriteFailed(TransportError),
}

/// Errors that end a relay session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("{0} already connected")]
    SlotBusy(Role),

    #[error("local transport failure: {0}")]
    LocalTransport(#[from] TransportError),

    #[error("failed to encode notification: {0}")]
    Notification(String),

    #[error("relay session panicked")]
    Panicked,
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Notification(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("No configuration directory available")]
    NoConfigDir,
}
