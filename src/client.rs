//! Async client handle for the game server's event stream.
//!
//! [`GameClient`] is a thin handle that talks to a background transport loop
//! over an unbounded MPSC channel. Decoded server events come back on a
//! bounded channel ([`tokio::sync::mpsc::Receiver<ClientEvent>`]) returned
//! from [`GameClient::start`].
//!
//! The loop is the only reader and writer of the transport, so inbound events
//! are delivered strictly in arrival order.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = connect_somehow().await;
//! let (client, mut events) = GameClient::start(transport, ClientConfig::default());
//!
//! client.send(ClientMessage::CreateRoom { player_name: "Alice".into() })?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Server(ServerMessage::RoomCreated(p)) => { /* … */ }
//!         ClientEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{ClientError, Result};
use crate::event::ClientEvent;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`GameClient`] connection.
///
/// # Example
///
/// ```
/// use spy_artist_client::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_event_channel_capacity(512)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.event_channel_capacity, 512);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped with a warning
    /// rather than blocking the transport loop. `Disconnected` is always
    /// delivered.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`GameClient::shutdown`] waits for the loop to close the
    /// transport before aborting it.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Set the capacity of the bounded event channel (clamped to ≥ 1).
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// State shared between the client handle and the transport loop.
struct ClientState {
    connected: AtomicBool,
}

impl ClientState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the game server.
///
/// [`send`](Self::send) hands a [`ClientMessage`] to the transport loop and
/// returns as soon as it is queued; the server's answer arrives later as an
/// event. Room identity lives in [`RoomState`](crate::room::RoomState), not here.
pub struct GameClient {
    cmd_tx: mpsc::UnboundedSender<ClientMessage>,
    state: Arc<ClientState>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl GameClient {
    /// Start the transport loop and return a handle plus event receiver.
    ///
    /// The receiver yields [`ClientEvent::Connected`] first, then decoded
    /// server events, and finally [`ClientEvent::Disconnected`].
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientMessage>();
        // tokio panics on a zero-capacity channel.
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let state = Arc::new(ClientState::new());
        let loop_state = Arc::clone(&state);

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx,
            loop_state,
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Actions ─────────────────────────────────────────────────────

    /// Queue any [`ClientMessage`] for the transport loop.
    ///
    /// In-round actions are normally produced by the
    /// [`PhaseMachine`](crate::machine::PhaseMachine), which applies the
    /// one-shot guards before anything reaches this method.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] if the transport has closed.
    pub fn send(&self, msg: ClientMessage) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(ClientError::NotConnected);
        }
        self.cmd_tx.send(msg).map_err(|_| ClientError::NotConnected)
    }

    /// Shut down the client, closing the transport and stopping the loop.
    ///
    /// The event receiver yields `Disconnected` and then `None`.
    pub async fn shutdown(&mut self) {
        debug!("GameClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for GameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        // No executor context for an async close here; abort the loop instead.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background loop multiplexing outgoing commands, shutdown and inbound
/// messages via `tokio::select!`.
///
/// Exits when the command channel closes, the shutdown signal fires, the
/// transport returns `None`, or a transport error occurs.
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientMessage>,
    event_tx: mpsc::Sender<ClientEvent>,
    state: Arc<ClientState>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    debug!("transport loop started");

    emit_event(&event_tx, ClientEvent::Connected).await;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(msg) => {
                        debug!(action = msg.name(), "sending client action");
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    emit_disconnected(
                                        &event_tx,
                                        &state,
                                        Some(format!("transport send error: {e}")),
                                    ).await;
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("failed to serialize ClientMessage: {e}");
                            }
                        }
                    }
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &state, Some("client shut down".into())).await;
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(server_msg) => {
                                emit_event(&event_tx, ClientEvent::from(server_msg)).await;
                            }
                            Err(e) => {
                                // One malformed message must not stop the stream.
                                warn!("failed to decode server event: {e}; raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &state,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    None => {
                        debug!("transport closed by server");
                        emit_disconnected(&event_tx, &state, None).await;
                        break;
                    }
                }
            }
        }
    }

    debug!("transport loop exited");
}

/// Forward an event without blocking; drops it with a warning when full.
async fn emit_event(event_tx: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            let kind = match &dropped {
                ClientEvent::Server(msg) => msg.kind().as_str(),
                ClientEvent::Connected => "connected",
                ClientEvent::Disconnected { .. } => "disconnected",
            };
            warn!(event = kind, "event channel full, dropping event");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit the final [`Disconnected`](ClientEvent::Disconnected) event.
///
/// Uses a blocking send: `Disconnected` is always the last event and must
/// never be dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<ClientEvent>,
    state: &ClientState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    if event_tx
        .send(ClientEvent::Disconnected { reason })
        .await
        .is_err()
    {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, ClientError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, ClientError>>>,
        ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
            };
            (transport, sent, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), ClientError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), ClientError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn pong_json() -> String {
        serde_json::to_string(&ServerMessage::Pong).unwrap()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connected_is_first_event() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(pong_json()))]);
        let (mut client, mut events) = GameClient::start(transport, ClientConfig::default());

        let first = events.recv().await.unwrap();
        assert!(matches!(first, ClientEvent::Connected), "got {first:?}");
        let second = events.recv().await.unwrap();
        assert_eq!(second, ClientEvent::Server(ServerMessage::Pong));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_messages_are_skipped() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok("not json".into())),
            Some(Ok(r#"{"event":"room_info","data":null}"#.into())),
            Some(Ok(r#"{"event":"no_such_event","data":{}}"#.into())),
            Some(Ok(pong_json())),
        ]);
        let (mut client, mut events) = GameClient::start(transport, ClientConfig::default());

        let _ = events.recv().await; // Connected
        let ev = events.recv().await.unwrap();
        assert_eq!(ev, ClientEvent::Server(ServerMessage::Pong));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn send_writes_json_in_order() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = GameClient::start(transport, ClientConfig::default());
        let _ = events.recv().await; // Connected

        client
            .send(ClientMessage::CreateRoom {
                player_name: "Alice".into(),
            })
            .unwrap();
        client
            .send(ClientMessage::JoinRoom {
                room_id: "AB12CD34".into(),
                player_name: "Bob".into(),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        {
            let messages = sent.lock().unwrap();
            assert_eq!(messages.len(), 2);
            let first: ClientMessage = serde_json::from_str(&messages[0]).unwrap();
            assert_eq!(
                first,
                ClientMessage::CreateRoom {
                    player_name: "Alice".into()
                }
            );
            let second: ClientMessage = serde_json::from_str(&messages[1]).unwrap();
            assert_eq!(
                second,
                ClientMessage::JoinRoom {
                    room_id: "AB12CD34".into(),
                    player_name: "Bob".into()
                }
            );
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(pong_json())), None]);
        let (mut client, mut events) = GameClient::start(transport, ClientConfig::default());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // Pong
        let event = events.recv().await.unwrap();
        assert_eq!(event, ClientEvent::Disconnected { reason: None });
        assert!(!client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn transport_recv_error_emits_disconnected() {
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Err(
            ClientError::TransportReceive("boom".into()),
        ))]);
        let (mut client, mut events) = GameClient::start(transport, ClientConfig::default());

        let _ = events.recv().await; // Connected
        let event = events.recv().await.unwrap();
        if let ClientEvent::Disconnected { reason } = event {
            assert!(reason.unwrap().contains("boom"));
        } else {
            panic!("expected Disconnected, got {event:?}");
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = GameClient::start(transport, ClientConfig::default());
        let _ = events.recv().await; // Connected

        client.shutdown().await;

        assert!(matches!(
            client.send(ClientMessage::Ping),
            Err(ClientError::NotConnected)
        ));
        assert!(matches!(
            client.send(ClientMessage::PlayAgain {}),
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected_and_closes_transport() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = GameClient::start(transport, ClientConfig::default());
        let _ = events.recv().await; // Connected

        client.shutdown().await;
        client.shutdown().await;

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            ClientEvent::Disconnected {
                reason: Some("client shut down".into())
            }
        );
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn config_defaults_and_clamping() {
        let config = ClientConfig::default();
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));

        let config = ClientConfig::default().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn small_event_channel_drops_but_always_delivers_disconnected() {
        let mut incoming: Vec<Option<std::result::Result<String, ClientError>>> = Vec::new();
        for _ in 0..20 {
            incoming.push(Some(Ok(pong_json())));
        }
        incoming.push(None);
        let (transport, _sent, _closed) = MockTransport::new(incoming);

        let config = ClientConfig::default().with_event_channel_capacity(1);
        let (mut client, mut events) = GameClient::start(transport, config);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut received = Vec::new();
        while let Some(event) = events.recv().await {
            received.push(event);
        }
        assert!(received.len() < 22, "expected drops, got {}", received.len());
        assert!(matches!(
            received.last(),
            Some(ClientEvent::Disconnected { .. })
        ));

        client.shutdown().await;
    }

    /// Transport whose `close()` never completes.
    struct HangingCloseTransport {
        dropped: Arc<AtomicBool>,
    }

    impl Drop for HangingCloseTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    #[async_trait]
    impl Transport for HangingCloseTransport {
        async fn send(&mut self, _message: String) -> std::result::Result<(), ClientError> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> std::result::Result<(), ClientError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_timeout_aborts_stuck_transport_task() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = HangingCloseTransport {
            dropped: Arc::clone(&dropped),
        };
        let config = ClientConfig::default().with_shutdown_timeout(Duration::from_millis(20));
        let (mut client, mut events) = GameClient::start(transport, config);
        let _ = events.recv().await; // Connected

        client.shutdown().await;

        assert!(dropped.load(Ordering::Acquire));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, _events) = GameClient::start(transport, ClientConfig::default());
        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("GameClient"));
        assert!(debug_str.contains("connected"));
        client.shutdown().await;
    }
}
