//! Event channel: one connection, one handler per event name.
//!
//! [`EventChannel`] wraps a [`Connector`] and the [`GameClient`] it produces.
//! It never queues or retries: sending while disconnected fails immediately
//! with [`ClientError::NotConnected`].

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::{ClientConfig, GameClient};
use crate::error::{ClientError, Result};
use crate::event::ClientEvent;
use crate::protocol::{ClientMessage, EventKind, ServerMessage};
use crate::transport::Connector;

/// A hook run for one inbound event kind.
pub type EventHandler = Box<dyn FnMut(&ServerMessage) + Send>;

/// Connection plus per-event hooks.
pub struct EventChannel<C: Connector> {
    connector: C,
    config: ClientConfig,
    client: Option<GameClient>,
    events: Option<mpsc::Receiver<ClientEvent>>,
    handlers: HashMap<EventKind, EventHandler>,
}

impl<C: Connector> std::fmt::Debug for EventChannel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("EventChannel")
            .field("client", &self.client)
            .field("handlers", &kinds)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> EventChannel<C> {
    pub fn new(connector: C, config: ClientConfig) -> Self {
        Self {
            connector,
            config,
            client: None,
            events: None,
            handlers: HashMap::new(),
        }
    }

    /// Open the connection. Does nothing while a live connection exists.
    ///
    /// # Errors
    ///
    /// Returns whatever the connector reports when dialing fails.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            debug!("connect: already connected");
            return Ok(());
        }
        if let Some(mut stale) = self.client.take() {
            stale.shutdown().await;
        }
        let transport = self.connector.connect().await?;
        let (client, events) = GameClient::start(transport, self.config.clone());
        info!("connected to game server");
        self.client = Some(client);
        self.events = Some(events);
        Ok(())
    }

    /// Register the hook for `kind`, replacing and returning any previous one.
    pub fn on(&mut self, kind: EventKind, handler: EventHandler) -> Option<EventHandler> {
        self.handlers.insert(kind, handler)
    }

    /// Remove the hook for `kind`.
    pub fn off(&mut self, kind: EventKind) -> Option<EventHandler> {
        self.handlers.remove(&kind)
    }

    /// Run the registered hook for `msg`, if any. Returns whether one ran.
    pub fn dispatch(&mut self, msg: &ServerMessage) -> bool {
        match self.handlers.get_mut(&msg.kind()) {
            Some(handler) => {
                handler(msg);
                true
            }
            None => false,
        }
    }

    /// Send one action.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotConnected`] when no live connection exists.
    pub fn send(&self, msg: ClientMessage) -> Result<()> {
        let client = self
            .client
            .as_ref()
            .filter(|c| c.is_connected())
            .ok_or(ClientError::NotConnected)?;
        debug!(action = msg.name(), "sending");
        client.send(msg)
    }

    pub fn is_connected(&self) -> bool {
        self.client.as_ref().is_some_and(GameClient::is_connected)
    }

    /// The next event from the connection.
    ///
    /// Pends forever when no connection was ever opened. Returns `None` once
    /// the current connection's stream has ended; call
    /// [`connect`](Self::connect) again to resume.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        let Some(events) = self.events.as_mut() else {
            return std::future::pending().await;
        };
        let event = events.recv().await;
        match &event {
            Some(ClientEvent::Server(msg)) => debug!(event = %msg.kind(), "received"),
            Some(other) => debug!(?other, "connection event"),
            None => {
                debug!("event stream ended");
                self.events = None;
            }
        }
        event
    }

    /// Close the connection, if any.
    pub async fn close(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.shutdown().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct ScriptTransport {
        incoming: VecDeque<String>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for ScriptTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), ClientError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ClientError>> {
            match self.incoming.pop_front() {
                Some(msg) => Some(Ok(msg)),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), ClientError> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct ScriptConnector {
        dials: Arc<AtomicUsize>,
        sent: Arc<Mutex<Vec<String>>>,
        script: Vec<String>,
    }

    #[async_trait]
    impl Connector for ScriptConnector {
        type Transport = ScriptTransport;

        async fn connect(&self) -> std::result::Result<ScriptTransport, ClientError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptTransport {
                incoming: self.script.iter().cloned().collect(),
                sent: Arc::clone(&self.sent),
            })
        }
    }

    #[tokio::test]
    async fn send_before_connect_is_not_connected() {
        let channel = EventChannel::new(ScriptConnector::default(), ClientConfig::default());
        let err = channel.send(ClientMessage::Ping).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let connector = ScriptConnector::default();
        let dials = Arc::clone(&connector.dials);
        let mut channel = EventChannel::new(connector, ClientConfig::default());
        channel.connect().await.unwrap();
        channel.connect().await.unwrap();
        assert_eq!(dials.load(Ordering::SeqCst), 1);
        assert_eq!(channel.next_event().await, Some(ClientEvent::Connected));
    }

    #[tokio::test]
    async fn later_handler_replaces_earlier() {
        let mut channel = EventChannel::new(ScriptConnector::default(), ClientConfig::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&hits);
        assert!(channel
            .on(EventKind::Pong, Box::new(move |_| {
                first.fetch_add(1, Ordering::SeqCst);
            }))
            .is_none());
        let second = Arc::clone(&hits);
        assert!(channel
            .on(EventKind::Pong, Box::new(move |_| {
                second.fetch_add(10, Ordering::SeqCst);
            }))
            .is_some());

        assert!(channel.dispatch(&ServerMessage::Pong));
        assert!(!channel.dispatch(&ServerMessage::Connected { message: None }));
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn events_arrive_in_order_and_sends_reach_transport() {
        let connector = ScriptConnector {
            script: vec![
                r#"{"event":"connected","data":{"message":"hi"}}"#.into(),
                r#"{"event":"pong"}"#.into(),
            ],
            ..ScriptConnector::default()
        };
        let sent = Arc::clone(&connector.sent);
        let mut channel = EventChannel::new(connector, ClientConfig::default());
        channel.connect().await.unwrap();

        assert_eq!(channel.next_event().await, Some(ClientEvent::Connected));
        assert!(matches!(
            channel.next_event().await,
            Some(ClientEvent::Server(ServerMessage::Connected { .. }))
        ));
        assert_eq!(
            channel.next_event().await,
            Some(ClientEvent::Server(ServerMessage::Pong))
        );

        channel.send(ClientMessage::Ping).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(sent.lock().unwrap().as_slice(), [r#"{"event":"ping"}"#]);

        channel.close().await;
        assert!(!channel.is_connected());
        assert!(matches!(
            channel.send(ClientMessage::Ping),
            Err(ClientError::NotConnected)
        ));
    }
}
