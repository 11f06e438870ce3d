//! # Scripted Round
//!
//! Plays one full round against an in-process scripted server so the whole
//! phase flow can be watched in the logs without a real backend.
//!
//! ```sh
//! RUST_LOG=spy_artist_client=debug cargo run --example scripted_round
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use spy_artist_client::protocol::{
    ArtSelectedPayload, GameEndedPayload, GameStartedPayload, JoinedPayload, ShowingPayload,
    SpyVoteResultPayload, StyleInfo,
};
use spy_artist_client::{
    ClientConfig, ClientError, Connector, EventChannel, EventKind, GameApp, GameConfig, Intent,
    LogPresenter, MemoryPreferences, NullEffects, Player, RevealTimings, ServerMessage, Transport,
};

const ROOM: &str = "DEMO2024";
const STEP: Duration = Duration::from_millis(300);

// ── Scripted server ─────────────────────────────────────────────────

/// Replays a fixed list of server events, pausing before each one, then
/// closes. Everything the client sends is only logged.
struct ScriptedServer {
    script: VecDeque<(Duration, ServerMessage)>,
}

#[async_trait]
impl Transport for ScriptedServer {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        tracing::info!("client -> server: {message}");
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        let (delay, msg) = self.script.pop_front()?;
        tokio::time::sleep(delay).await;
        Some(serde_json::to_string(&msg).map_err(ClientError::from))
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        Ok(())
    }
}

struct ScriptedConnector;

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedServer;

    async fn connect(&self) -> Result<ScriptedServer, ClientError> {
        Ok(ScriptedServer {
            script: round_script().into(),
        })
    }
}

fn roster() -> Vec<Player> {
    vec![
        Player::new("p1", "Mina").with_host(true),
        Player::new("p2", "Theo"),
        Player::new("p3", "Ada"),
    ]
}

fn art(player_id: &str) -> ServerMessage {
    ServerMessage::ArtSelected(ArtSelectedPayload {
        player_id: player_id.into(),
        selected_art: "aW1hZ2U=".into(),
        players: vec![],
        show_time: Some(1),
    })
}

/// One round in which `p2` is the spy, gets caught and then names the word.
fn round_script() -> Vec<(Duration, ServerMessage)> {
    let players = roster();
    let me = players.first().cloned().unwrap_or_else(|| Player::new("p1", "Mina"));
    vec![
        (
            STEP,
            ServerMessage::RoomCreated(JoinedPayload {
                room_id: ROOM.into(),
                player: me.clone(),
                players: vec![me],
            }),
        ),
        (
            STEP,
            ServerMessage::PlayerJoined {
                player: None,
                players: players.clone(),
            },
        ),
        (
            STEP,
            ServerMessage::StartVotingTopic {
                topics: vec!["animals".into(), "food".into(), "sports".into()],
                players: vec![],
            },
        ),
        (
            STEP,
            ServerMessage::GameStarted(GameStartedPayload {
                topic: "animals".into(),
                keyword: Some("cat".into()),
                is_spy: false,
                round: 1,
                styles: vec![StyleInfo {
                    id: Some(1),
                    style_name: "watercolor".into(),
                    thumbnail: None,
                    introduction: None,
                }],
            }),
        ),
        (STEP, ServerMessage::WriteDrawingPrompt { round: Some(1) }),
        (STEP, ServerMessage::DrawingStarted { message: None }),
        (STEP, ServerMessage::DrawingFinished { players: vec![] }),
        (
            STEP,
            ServerMessage::MyArt {
                round: Some(1),
                image_data: vec!["aW1nMQ==".into(), "aW1nMg==".into()],
            },
        ),
        (
            STEP,
            ServerMessage::StartShowing(ShowingPayload {
                show_art_order: vec!["p1".into(), "p2".into(), "p3".into()],
                now_showing: 0,
                show_time: Some(1),
                round: Some(1),
                players: vec![],
            }),
        ),
        (STEP, art("p1")),
        (STEP, art("p2")),
        (STEP, art("p3")),
        (
            STEP,
            ServerMessage::StartVotingSpy {
                players: vec![],
                round: Some(1),
            },
        ),
        (
            STEP,
            ServerMessage::VotingSpyResult(SpyVoteResultPayload {
                most_voted_player: Some("p2".into()),
                spy_is: "p2".into(),
                guess_spy_correct: None,
                vote_counts: BTreeMap::from([("p1".into(), 0), ("p2".into(), 2), ("p3".into(), 1)]),
                vote_results: BTreeMap::new(),
                spy_options: vec!["cat".into(), "dog".into(), "owl".into()],
            }),
        ),
        (
            STEP * 8,
            ServerMessage::GameEnded(GameEndedPayload {
                win_type: None,
                correct_answer: "cat".into(),
                spy_guess: "dog".into(),
                correct: None,
                gallery: vec![],
            }),
        ),
    ]
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = GameConfig::default()
        .with_timings(RevealTimings::default().scaled(0.1))
        .with_vote_countdown(Duration::from_secs(5));
    let channel = EventChannel::new(ScriptedConnector, ClientConfig::default());
    let (mut app, intents) = GameApp::new(
        channel,
        config,
        Box::new(LogPresenter),
        Box::new(NullEffects),
        Box::new(MemoryPreferences::new()),
    );

    // Play the host's part: each hook queues the answer to a prompt.
    let answers = [
        (EventKind::StartVotingTopic, Intent::ChooseTopic(0)),
        (
            EventKind::WriteDrawingPrompt,
            Intent::SubmitPrompt("a sleepy cat on a windowsill".into()),
        ),
        (EventKind::StartShowing, Intent::SelectArt(1)),
        (EventKind::StartVotingSpy, Intent::VoteSpy("p2".into())),
    ];
    for (kind, intent) in answers {
        let tx = intents.clone();
        app.on(
            kind,
            Box::new(move |_| {
                if let Err(e) = tx.try_send(intent.clone()) {
                    tracing::warn!("could not queue intent: {e}");
                }
            }),
        );
    }

    app.connect().await?;
    intents
        .send(Intent::CreateRoom {
            player_name: "Mina".into(),
        })
        .await?;

    let length: Duration = round_script().iter().map(|(delay, _)| *delay).sum();
    tokio::select! {
        () = app.run() => {}
        () = tokio::time::sleep(length + Duration::from_secs(4)) => {}
    }
    tracing::info!(phase = ?app.machine().phase(), "script finished");
    Ok(())
}
