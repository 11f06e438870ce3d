#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the integration tests.
//!
//! Provides a scripted [`MockTransport`], a [`MockConnector`] that hands out
//! one, a [`Recorder`]-backed machine builder, and helpers that build server
//! event JSON.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use spy_artist_client::machine::CueReceivers;
use spy_artist_client::presentation::Recorder;
use spy_artist_client::protocol::{
    GameEndedPayload, GameStartedPayload, JoinedPayload, Player, ServerMessage, ShowingPayload,
    SpyVoteResultPayload, StyleInfo,
};
use spy_artist_client::{
    ClientError, Connector, GameConfig, MemoryPreferences, PhaseMachine, RevealTimings, Transport,
};

pub const ROOM: &str = "AB12CD34";

// ── MockTransport ───────────────────────────────────────────────────

type Script = VecDeque<Option<Result<String, ClientError>>>;

/// Scripted transport. Incoming items are consumed in order by `recv()`;
/// once the script is exhausted `recv()` pends forever.
pub struct MockTransport {
    incoming: Script,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(
        incoming: Vec<Option<Result<String, ClientError>>>,
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

    /// A transport that only delivers successful text frames.
    pub fn scripted(
        incoming: impl IntoIterator<Item = String>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        Self::new(incoming.into_iter().map(|m| Some(Ok(m))).collect())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), ClientError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, ClientError>> {
        match self.incoming.pop_front() {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Connector that replays the same script on every dial.
#[derive(Clone, Default)]
pub struct MockConnector {
    pub script: Vec<String>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub dials: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(script: Vec<String>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Every message sent so far, decoded to JSON values.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self) -> Result<MockTransport, ClientError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(MockTransport {
            incoming: self.script.iter().cloned().map(|m| Some(Ok(m))).collect(),
            sent: Arc::clone(&self.sent),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

// ── Machine harness ─────────────────────────────────────────────────

pub struct Harness {
    pub machine: PhaseMachine,
    pub cues: CueReceivers,
    pub recorder: Recorder,
    pub prefs: MemoryPreferences,
}

impl Harness {
    pub fn new(config: GameConfig) -> Self {
        let recorder = Recorder::new();
        let prefs = MemoryPreferences::new();
        let (machine, cues) = PhaseMachine::new(
            config,
            Box::new(recorder.clone()),
            Box::new(recorder.clone()),
            Box::new(prefs.clone()),
        );
        Self {
            machine,
            cues,
            recorder,
            prefs,
        }
    }

    /// Zero-delay timings so sequences complete on the next few polls.
    pub fn instant() -> Self {
        Self::new(GameConfig::default().with_timings(RevealTimings::instant()))
    }

    /// Join `ROOM` as `me` with the given roster; the first id is host.
    pub fn joined(me: &str, roster: &[&str]) -> Self {
        let mut h = Self::instant();
        h.join(me, roster);
        h
    }

    pub fn join(&mut self, me: &str, roster: &[&str]) {
        let players = players(roster);
        let player = players.iter().find(|p| p.id == me).cloned().unwrap();
        self.machine
            .handle(ServerMessage::JoinRoomSuccess(JoinedPayload {
                room_id: ROOM.into(),
                player,
                players,
            }));
    }

    /// Deliver every pending reveal cue.
    pub async fn drain_reveal(&mut self) {
        while let Some(cue) = self.cues.reveal.recv().await {
            let last = cue.last;
            self.machine.on_reveal_cue(cue);
            if last {
                break;
            }
        }
    }

    /// Deliver every pending result cue.
    pub async fn drain_result(&mut self) {
        while let Some(cue) = self.cues.result.recv().await {
            let last = cue.last;
            self.machine.on_result_cue(cue);
            if last {
                break;
            }
        }
    }
}

// ── Builders ────────────────────────────────────────────────────────

pub fn players(ids: &[&str]) -> Vec<Player> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| Player::new(*id, id.to_uppercase()).with_host(i == 0))
        .collect()
}

pub fn game_started(is_spy: bool) -> ServerMessage {
    ServerMessage::GameStarted(GameStartedPayload {
        topic: "animals".into(),
        keyword: (!is_spy).then(|| "cat".to_string()),
        is_spy,
        round: 1,
        styles: vec![
            StyleInfo {
                id: Some(1),
                style_name: "watercolor".into(),
                thumbnail: None,
                introduction: None,
            },
            StyleInfo {
                id: Some(2),
                style_name: "pixel".into(),
                thumbnail: None,
                introduction: None,
            },
        ],
    })
}

pub fn showing(order: &[&str], now: usize) -> ServerMessage {
    ServerMessage::StartShowing(ShowingPayload {
        show_art_order: order.iter().map(|s| (*s).to_string()).collect(),
        now_showing: now,
        show_time: Some(10),
        round: Some(1),
        players: vec![],
    })
}

pub fn vote_result(spy: &str, counts: &[(&str, u32)]) -> ServerMessage {
    ServerMessage::VotingSpyResult(SpyVoteResultPayload {
        most_voted_player: None,
        spy_is: spy.into(),
        guess_spy_correct: None,
        vote_counts: counts
            .iter()
            .map(|(id, n)| ((*id).to_string(), *n))
            .collect::<BTreeMap<_, _>>(),
        vote_results: BTreeMap::new(),
        spy_options: vec!["cat".into(), "dog".into(), "owl".into()],
    })
}

pub fn game_ended(spy_guess: &str, keyword: &str) -> ServerMessage {
    ServerMessage::GameEnded(GameEndedPayload {
        win_type: None,
        correct_answer: keyword.into(),
        spy_guess: spy_guess.into(),
        correct: None,
        gallery: vec![],
    })
}

// ── JSON helpers ────────────────────────────────────────────────────

pub fn json(msg: &ServerMessage) -> String {
    serde_json::to_string(msg).expect("server message serialization")
}

pub fn room_created_json(me: &str, name: &str) -> String {
    let player = Player::new(me, name).with_host(true);
    json(&ServerMessage::RoomCreated(JoinedPayload {
        room_id: ROOM.into(),
        players: vec![player.clone()],
        player,
    }))
}

pub fn pong_json() -> String {
    json(&ServerMessage::Pong)
}

pub fn error_json(message: &str) -> String {
    json(&ServerMessage::Error {
        message: Some(message.into()),
    })
}
