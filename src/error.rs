//! Error types for the Spy Among Artists client.

use thiserror::Error;

use crate::validate::ValidationError;

/// Errors that can occur when using the game client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted to send an action while the connection is down.
    ///
    /// Actions are never queued: the caller surfaces this to the user and
    /// waits for the next server event after reconnection.
    #[error("not connected to server")]
    NotConnected,

    /// Local input was rejected before anything was sent.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for game client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
