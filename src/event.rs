//! Events emitted by the [`GameClient`](crate::client::GameClient) transport loop.

use crate::protocol::ServerMessage;

/// One item on the client's event channel.
///
/// `Connected` is always first and `Disconnected` always last; everything in
/// between is a decoded server message in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Synthetic event emitted once the transport loop starts.
    Connected,
    /// A decoded inbound server event.
    Server(ServerMessage),
    /// The transport closed or failed, or the client shut down.
    Disconnected {
        /// `None` when the server closed the connection cleanly.
        reason: Option<String>,
    },
}

impl From<ServerMessage> for ClientEvent {
    fn from(msg: ServerMessage) -> Self {
        Self::Server(msg)
    }
}
