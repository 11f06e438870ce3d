//! # WebSocket Lobby
//!
//! Connects to a live game server, creates a room and logs every view
//! update until Ctrl+C.
//!
//! ```sh
//! cargo run --example websocket_lobby
//!
//! # Override the server URL and the player name:
//! SPY_ARTIST_URL=ws://my-server:3000/ws SPY_ARTIST_NAME=Mina cargo run --example websocket_lobby
//! ```

use std::time::Duration;

use spy_artist_client::{
    ClientConfig, EventChannel, EventKind, GameApp, GameConfig, Intent, LogPresenter,
    MemoryPreferences, NullEffects, WebSocketConnector,
};

/// Default server URL when `SPY_ARTIST_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:3000/ws";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("SPY_ARTIST_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let name = std::env::var("SPY_ARTIST_NAME").unwrap_or_else(|_| "RustPlayer".to_string());
    tracing::info!("connecting to {url} as {name}");

    let connector = WebSocketConnector::new(url).with_timeout(Duration::from_secs(10));
    let channel = EventChannel::new(connector, ClientConfig::default());
    let (mut app, intents) = GameApp::new(
        channel,
        GameConfig::default(),
        Box::new(LogPresenter),
        Box::new(NullEffects),
        Box::new(MemoryPreferences::new()),
    );

    // Print the shareable code as soon as the room exists.
    app.on(
        EventKind::RoomCreated,
        Box::new(|msg| tracing::info!("room ready: {msg:?}")),
    );

    // ── Connect and create a room ───────────────────────────────────
    app.connect().await?;
    intents
        .send(Intent::CreateRoom { player_name: name })
        .await?;

    // ── Run until Ctrl+C ────────────────────────────────────────────
    tokio::select! {
        () = app.run() => tracing::info!("game loop finished"),
        _ = tokio::signal::ctrl_c() => tracing::info!("Ctrl+C received, shutting down"),
    }

    Ok(())
}
