//! Wire types for the Spy Among Artists event stream.
//!
//! Every message in either direction is one adjacently tagged JSON object:
//!
//! ```json
//! {"event": "submit_spy_vote", "data": {"voted_player_id": "…"}}
//! ```
//!
//! Field names follow the server exactly, including the few camelCase keys
//! in the end-of-game payload (`winType`, `correctAnswer`, `spyGuess`,
//! `selectedImage`). Optional or late-added fields carry `#[serde(default)]`
//! so an older server never makes a whole message undecodable.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::outcome::WinType;

// ── Type aliases ────────────────────────────────────────────────────

/// Server-issued player identifier. Opaque and stable for the session.
pub type PlayerId = String;

/// Eight-character alphanumeric room code.
pub type RoomCode = String;

// ── Shared structs ──────────────────────────────────────────────────

/// A player as the server describes it in roster payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    #[serde(default)]
    pub avatar_id: u32,
    #[serde(default)]
    pub is_host: bool,
    /// Whether the player's socket is currently attached.
    #[serde(default = "default_connected")]
    pub connected: bool,
}

fn default_connected() -> bool {
    true
}

impl Player {
    /// Convenience constructor used by hosts of the crate and by tests.
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar_id: 0,
            is_host: false,
            connected: true,
        }
    }

    /// Mark the player as room host.
    #[must_use]
    pub fn with_host(mut self, is_host: bool) -> Self {
        self.is_host = is_host;
        self
    }

    /// Set the avatar shown for the player.
    #[must_use]
    pub fn with_avatar(mut self, avatar_id: u32) -> Self {
        self.avatar_id = avatar_id;
        self
    }
}

/// One entry of the art-style catalog delivered with `game_started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleInfo {
    /// Explicit style id. When absent the catalog index is the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub style_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
}

/// One drawing round's submission as packed for the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub round: u32,
    #[serde(default)]
    pub prompt: String,
    /// Base64-encoded PNG images generated for the prompt.
    #[serde(default)]
    pub image_data: Vec<String>,
    /// Index into `image_data` the player chose to show.
    #[serde(default, rename = "selectedImage")]
    pub selected_image: Option<usize>,
}

impl Submission {
    /// The image the player chose to show, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected_image
            .and_then(|i| self.image_data.get(i))
            .map(String::as_str)
    }

    /// Images generated for the prompt but not shown.
    pub fn unselected(&self) -> impl Iterator<Item = &str> {
        let selected = self.selected_image;
        self.image_data
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != selected)
            .map(|(_, image)| image.as_str())
    }
}

/// All submissions of one player across the game's rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryEntry {
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub gallery_data: Vec<Submission>,
}

// ── Server phase names ──────────────────────────────────────────────

/// Phase names the server reports on `room_info` / `room_rejoined`.
///
/// The server may send either the name or its integer index into the
/// room's phase table (`waiting, voting_topic, show_topic, drawing,
/// show_art, drawing, show_art, voting, spy_guess, ended`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerPhase {
    Waiting,
    VotingTopic,
    ShowTopic,
    Drawing,
    ShowArt,
    Voting,
    SpyGuess,
    Ended,
}

/// The server's phase table, indexed by its integer phase counter.
const SERVER_PHASE_TABLE: [ServerPhase; 10] = [
    ServerPhase::Waiting,
    ServerPhase::VotingTopic,
    ServerPhase::ShowTopic,
    ServerPhase::Drawing,
    ServerPhase::ShowArt,
    ServerPhase::Drawing,
    ServerPhase::ShowArt,
    ServerPhase::Voting,
    ServerPhase::SpyGuess,
    ServerPhase::Ended,
];

impl ServerPhase {
    /// Wire name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::VotingTopic => "voting_topic",
            Self::ShowTopic => "show_topic",
            Self::Drawing => "drawing",
            Self::ShowArt => "show_art",
            Self::Voting => "voting",
            Self::SpyGuess => "spy_guess",
            Self::Ended => "ended",
        }
    }

    /// Resolve the server's integer phase counter.
    pub fn from_index(index: u64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| SERVER_PHASE_TABLE.get(i))
            .copied()
    }
}

impl fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A phase name that the client does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown phase: {0}")]
pub struct UnknownPhase(pub String);

impl FromStr for ServerPhase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "waiting" => Self::Waiting,
            "voting_topic" => Self::VotingTopic,
            "show_topic" => Self::ShowTopic,
            "drawing" => Self::Drawing,
            "show_art" => Self::ShowArt,
            "voting" => Self::Voting,
            "spy_guess" => Self::SpyGuess,
            "ended" => Self::Ended,
            other => return Err(UnknownPhase(other.to_string())),
        })
    }
}

impl Serialize for ServerPhase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServerPhase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(u64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Index(index) => Self::from_index(index)
                .ok_or_else(|| de::Error::custom(format!("phase index out of range: {index}"))),
            Raw::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

// ── Payload structs ─────────────────────────────────────────────────

/// Payload of `room_created` and `join_room_success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedPayload {
    pub room_id: RoomCode,
    /// The joining client's own player record.
    pub player: Player,
    #[serde(default)]
    pub players: Vec<Player>,
}

/// Payload of `room_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfoPayload {
    pub room_id: RoomCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ServerPhase>,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_round: Option<u32>,
}

/// Payload of `room_rejoined`, sent after a reconnecting client asks to
/// resume its seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejoinedPayload {
    pub room_id: RoomCode,
    pub player: Player,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ServerPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_round: Option<u32>,
}

/// Payload of `game_started`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStartedPayload {
    pub topic: String,
    /// The secret keyword; `None` for the spy.
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub is_spy: bool,
    #[serde(default = "first_round")]
    pub round: u32,
    #[serde(default)]
    pub styles: Vec<StyleInfo>,
}

fn first_round() -> u32 {
    1
}

/// Payload of `start_showing`: whose turn it is to reveal an artwork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowingPayload {
    pub show_art_order: Vec<PlayerId>,
    pub now_showing: usize,
    /// Seconds each artwork stays on screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(default)]
    pub players: Vec<Player>,
}

impl ShowingPayload {
    /// The player whose turn it is, if the index is in range.
    pub fn current_turn(&self) -> Option<&PlayerId> {
        self.show_art_order.get(self.now_showing)
    }
}

/// Payload of `art_selected`: one artwork revealed to the whole table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtSelectedPayload {
    pub player_id: PlayerId,
    /// Base64-encoded PNG.
    pub selected_art: String,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_time: Option<u32>,
}

/// Payload of `voting_spy_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpyVoteResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_voted_player: Option<PlayerId>,
    /// The true spy.
    pub spy_is: PlayerId,
    /// Whether the group's vote landed on the spy, as judged by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guess_spy_correct: Option<bool>,
    /// Votes received per player. Players without votes may be absent.
    #[serde(default)]
    pub vote_counts: BTreeMap<PlayerId, u32>,
    /// Voter ids per voted player.
    #[serde(default)]
    pub vote_results: BTreeMap<PlayerId, Vec<PlayerId>>,
    /// Candidate keywords offered to the spy.
    #[serde(default)]
    pub spy_options: Vec<String>,
}

/// Payload of `game_ended`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEndedPayload {
    /// The server's own classification. The client recomputes it.
    #[serde(default, rename = "winType", skip_serializing_if = "Option::is_none")]
    pub win_type: Option<WinType>,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: String,
    #[serde(default, rename = "spyGuess")]
    pub spy_guess: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(default)]
    pub gallery: Vec<GalleryEntry>,
}

impl GameEndedPayload {
    /// Whether the spy's guess matched the keyword.
    ///
    /// Uses the explicit flag when present and compares the words otherwise.
    pub fn spy_guessed_correctly(&self) -> bool {
        self.correct
            .unwrap_or_else(|| self.spy_guess.trim() == self.correct_answer.trim())
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Actions sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a room with the sender as host.
    CreateRoom { player_name: String },
    /// Join an existing room by code.
    JoinRoom { room_id: RoomCode, player_name: String },
    /// Ask for a full roster sync.
    GetRoomInfo {},
    /// Resume a seat after reconnecting.
    RejoinRoom { room_id: RoomCode, player_id: PlayerId },
    ChangeAvatar { avatar_id: u32 },
    /// Host only: start the round's topic vote.
    TopicVoteStart {},
    TopicVoted { selected_topic_no: usize },
    SubmitDrawingPrompt { prompt: String, style_id: u32 },
    /// Pull the artwork generated for the sender's prompt.
    #[serde(rename = "get_myArt")]
    GetMyArt {},
    /// Acknowledge that the generated artwork was rendered.
    ArtReceived {},
    SelectedArt { selected_art_no: usize },
    SubmitSpyVote { voted_player_id: PlayerId },
    SpyGuess { guessed_keyword: String },
    PlayAgain {},
    LeaveRoom {},
    /// Heartbeat.
    Ping,
}

impl ClientMessage {
    /// Wire name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::GetRoomInfo {} => "get_room_info",
            Self::RejoinRoom { .. } => "rejoin_room",
            Self::ChangeAvatar { .. } => "change_avatar",
            Self::TopicVoteStart {} => "topic_vote_start",
            Self::TopicVoted { .. } => "topic_voted",
            Self::SubmitDrawingPrompt { .. } => "submit_drawing_prompt",
            Self::GetMyArt {} => "get_myArt",
            Self::ArtReceived {} => "art_received",
            Self::SelectedArt { .. } => "selected_art",
            Self::SubmitSpyVote { .. } => "submit_spy_vote",
            Self::SpyGuess { .. } => "spy_guess",
            Self::PlayAgain {} => "play_again",
            Self::LeaveRoom {} => "leave_room",
            Self::Ping => "ping",
        }
    }
}

/// Events pushed from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent when the socket attaches.
    Connected {
        #[serde(default)]
        message: Option<String>,
    },
    RoomCreated(JoinedPayload),
    JoinRoomSuccess(JoinedPayload),
    RoomInfo(RoomInfoPayload),
    RoomRejoined(RejoinedPayload),
    PlayerJoined {
        #[serde(default)]
        player: Option<Player>,
        #[serde(default)]
        players: Vec<Player>,
    },
    PlayerLeft {
        #[serde(default)]
        player_id: Option<PlayerId>,
        #[serde(default)]
        player_name: Option<String>,
        #[serde(default)]
        players: Vec<Player>,
    },
    AvatarChanged {
        player_id: PlayerId,
        avatar_id: u32,
    },
    StartVotingTopic {
        topics: Vec<String>,
        #[serde(default)]
        players: Vec<Player>,
    },
    GameStarted(GameStartedPayload),
    WriteDrawingPrompt {
        #[serde(default)]
        round: Option<u32>,
    },
    /// The server accepted the prompt and queued generation.
    DrawingStarted {
        #[serde(default)]
        message: Option<String>,
    },
    /// Generation failed; the player may submit another prompt.
    DrawingError {
        #[serde(default)]
        message: Option<String>,
    },
    /// Every player's artwork is ready to be pulled with `get_myArt`.
    DrawingFinished {
        #[serde(default)]
        players: Vec<Player>,
    },
    MyArt {
        #[serde(default)]
        round: Option<u32>,
        image_data: Vec<String>,
    },
    StartShowing(ShowingPayload),
    ArtSelected(ArtSelectedPayload),
    StartVotingSpy {
        #[serde(default)]
        players: Vec<Player>,
        #[serde(default)]
        round: Option<u32>,
    },
    VotingSpyResult(SpyVoteResultPayload),
    GameEnded(GameEndedPayload),
    PlayerPlayAgain {
        player_id: PlayerId,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    Pong,
}

/// Names of inbound events, used as keys of the handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Connected,
    RoomCreated,
    JoinRoomSuccess,
    RoomInfo,
    RoomRejoined,
    PlayerJoined,
    PlayerLeft,
    AvatarChanged,
    StartVotingTopic,
    GameStarted,
    WriteDrawingPrompt,
    DrawingStarted,
    DrawingError,
    DrawingFinished,
    MyArt,
    StartShowing,
    ArtSelected,
    StartVotingSpy,
    VotingSpyResult,
    GameEnded,
    PlayerPlayAgain,
    Error,
    Pong,
}

impl EventKind {
    /// Every inbound event, in catalog order.
    pub const ALL: [EventKind; 23] = [
        Self::Connected,
        Self::RoomCreated,
        Self::JoinRoomSuccess,
        Self::RoomInfo,
        Self::RoomRejoined,
        Self::PlayerJoined,
        Self::PlayerLeft,
        Self::AvatarChanged,
        Self::StartVotingTopic,
        Self::GameStarted,
        Self::WriteDrawingPrompt,
        Self::DrawingStarted,
        Self::DrawingError,
        Self::DrawingFinished,
        Self::MyArt,
        Self::StartShowing,
        Self::ArtSelected,
        Self::StartVotingSpy,
        Self::VotingSpyResult,
        Self::GameEnded,
        Self::PlayerPlayAgain,
        Self::Error,
        Self::Pong,
    ];

    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::RoomCreated => "room_created",
            Self::JoinRoomSuccess => "join_room_success",
            Self::RoomInfo => "room_info",
            Self::RoomRejoined => "room_rejoined",
            Self::PlayerJoined => "player_joined",
            Self::PlayerLeft => "player_left",
            Self::AvatarChanged => "avatar_changed",
            Self::StartVotingTopic => "start_voting_topic",
            Self::GameStarted => "game_started",
            Self::WriteDrawingPrompt => "write_drawing_prompt",
            Self::DrawingStarted => "drawing_started",
            Self::DrawingError => "drawing_error",
            Self::DrawingFinished => "drawing_finished",
            Self::MyArt => "my_art",
            Self::StartShowing => "start_showing",
            Self::ArtSelected => "art_selected",
            Self::StartVotingSpy => "start_voting_spy",
            Self::VotingSpyResult => "voting_spy_result",
            Self::GameEnded => "game_ended",
            Self::PlayerPlayAgain => "player_play_again",
            Self::Error => "error",
            Self::Pong => "pong",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event name that is not part of the inbound catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

impl ServerMessage {
    /// The event's catalog entry.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::RoomCreated(_) => EventKind::RoomCreated,
            Self::JoinRoomSuccess(_) => EventKind::JoinRoomSuccess,
            Self::RoomInfo(_) => EventKind::RoomInfo,
            Self::RoomRejoined(_) => EventKind::RoomRejoined,
            Self::PlayerJoined { .. } => EventKind::PlayerJoined,
            Self::PlayerLeft { .. } => EventKind::PlayerLeft,
            Self::AvatarChanged { .. } => EventKind::AvatarChanged,
            Self::StartVotingTopic { .. } => EventKind::StartVotingTopic,
            Self::GameStarted(_) => EventKind::GameStarted,
            Self::WriteDrawingPrompt { .. } => EventKind::WriteDrawingPrompt,
            Self::DrawingStarted { .. } => EventKind::DrawingStarted,
            Self::DrawingError { .. } => EventKind::DrawingError,
            Self::DrawingFinished { .. } => EventKind::DrawingFinished,
            Self::MyArt { .. } => EventKind::MyArt,
            Self::StartShowing(_) => EventKind::StartShowing,
            Self::ArtSelected(_) => EventKind::ArtSelected,
            Self::StartVotingSpy { .. } => EventKind::StartVotingSpy,
            Self::VotingSpyResult(_) => EventKind::VotingSpyResult,
            Self::GameEnded(_) => EventKind::GameEnded,
            Self::PlayerPlayAgain { .. } => EventKind::PlayerPlayAgain,
            Self::Error { .. } => EventKind::Error,
            Self::Pong => EventKind::Pong,
        }
    }
}
