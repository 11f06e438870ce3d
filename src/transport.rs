//! Transport abstraction for the game's event stream.
//!
//! The [`Transport`] trait defines a bidirectional text message channel between
//! the client and the game server. Every message is one JSON envelope of the
//! form `{"event": "<name>", "data": {...}}`, so a transport only has to
//! preserve message boundaries and arrival order.
//!
//! Reconnection backoff and heartbeats are not part of this crate. A
//! [`Connector`] knows how to open a fresh connection; the
//! [`EventChannel`](crate::channel::EventChannel) calls it on
//! [`connect`](crate::channel::EventChannel::connect) and the embedding
//! application decides when to call it again after a drop.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use spy_artist_client::error::ClientError;
//! use spy_artist_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ClientError> {
//!         // Send the JSON text message over your transport
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ClientError>> {
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ClientError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ClientError;

/// A bidirectional text message transport carrying game events.
///
/// Implementors shuttle serialized JSON strings between the client and server.
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TransportSend`] if the message could not be sent.
    async fn send(&mut self, message: String) -> Result<(), ClientError>;

    /// Receive the next JSON text message from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` — a complete message was received
    /// - `Some(Err(e))` — a transport error occurred
    /// - `None` — the connection was closed cleanly by the server
    async fn recv(&mut self) -> Option<Result<String, ClientError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens new [`Transport`] connections.
///
/// Kept separate from [`Transport`] because connection parameters (URLs,
/// TLS, proxies) differ between backends while the message channel does not.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport produced by a successful connection.
    type Transport: Transport;

    /// Establish a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] or [`ClientError::Timeout`] when the
    /// connection cannot be established.
    async fn connect(&self) -> Result<Self::Transport, ClientError>;
}
