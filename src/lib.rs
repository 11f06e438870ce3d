//! # Spy Artist Client
//!
//! Client-side game flow for *Spy Among Artists*, a party game in which
//! players draw with an image generator while one of them, the spy, does not
//! know the keyword.
//!
//! The crate is layered from the wire up:
//!
//! - **Connection**: [`Transport`] / [`Connector`] seams, a WebSocket backend
//!   behind the default `transport-websocket` feature, and [`GameClient`], the
//!   background loop that delivers decoded [`ServerMessage`]s in arrival order.
//! - **Event channel**: [`EventChannel`] adds idempotent connect, one hook per
//!   event name and fail-fast sends.
//! - **Game flow**: [`PhaseMachine`] owns the current [`Phase`], the room
//!   roster, one-shot action guards and the two timed narrative sequences.
//!   It renders through a [`Presenter`] and never touches a UI toolkit.
//! - **Application**: [`GameApp`] wires the two together and runs the single
//!   cooperative loop.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spy_artist_client::{
//!     ClientConfig, EventChannel, GameApp, GameConfig, Intent, LogPresenter,
//!     MemoryPreferences, NullEffects, WebSocketConnector,
//! };
//!
//! let channel = EventChannel::new(
//!     WebSocketConnector::new("ws://localhost:3000/ws"),
//!     ClientConfig::default(),
//! );
//! let (mut app, intents) = GameApp::new(
//!     channel,
//!     GameConfig::default(),
//!     Box::new(LogPresenter),
//!     Box::new(NullEffects),
//!     Box::new(MemoryPreferences::new()),
//! );
//! app.connect().await?;
//! intents.send(Intent::CreateRoom { player_name: "Alice".into() }).await?;
//! app.run().await;
//! ```

pub mod app;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod gate;
pub mod machine;
pub mod outcome;
pub mod prefs;
pub mod presentation;
pub mod protocol;
pub mod reveal;
pub mod room;
pub mod sequence;
pub mod transport;
pub mod transports;
pub mod validate;

// Re-export primary types for ergonomic imports.
pub use app::GameApp;
pub use channel::EventChannel;
pub use client::{ClientConfig, GameClient};
pub use config::{GameConfig, RevealTimings};
pub use error::ClientError;
pub use event::ClientEvent;
pub use gate::{ActionGate, ActionKey, ErrorPolicy};
pub use machine::{Intent, Phase, PhaseMachine};
pub use outcome::WinType;
pub use prefs::{MemoryPreferences, Preferences, SessionCache};
pub use presentation::{EffectsPlayer, LogPresenter, NullEffects, Presenter, ViewUpdate};
pub use protocol::{ClientMessage, EventKind, Player, ServerMessage, ServerPhase};
pub use room::RoomState;
pub use transport::{Connector, Transport};
pub use validate::{DefaultValidator, ValidationError, Validator};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
