//! The client-side game phase state machine.
//!
//! [`PhaseMachine`] is the single authority for which phase the client is in
//! and what the player may do. It consumes inbound [`ServerMessage`]s in
//! arrival order, mutates [`RoomState`], drives the two narrative
//! [`SequencePlayer`]s, and describes every visible change to a
//! [`Presenter`].
//!
//! The machine never performs I/O. Follow-up actions that an event demands
//! (`get_room_info`, `get_myArt`, `art_received`) are returned from
//! [`handle`](PhaseMachine::handle); user intents return the action to send.
//! Stage timers deliver [`Cue`]s on the receivers returned by
//! [`PhaseMachine::new`], and the owner feeds them back through the
//! `on_*_cue` methods.
//!
//! Out-of-order events are never rejected. The server owns ordering; an event
//! that arrives "early" simply moves the machine to that event's phase.

use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::gate::{ActionGate, ActionKey};
use crate::outcome;
use crate::prefs::{Preferences, SavedSession, SessionCache};
use crate::presentation::{
    Area, Container, Effect, EffectsPlayer, Interface, Notice, Presenter, ViewUpdate,
};
use crate::protocol::{
    ArtSelectedPayload, ClientMessage, GameEndedPayload, GameStartedPayload, JoinedPayload,
    Player, PlayerId, RejoinedPayload, RoomInfoPayload, ServerMessage, ServerPhase,
    ShowingPayload, SpyVoteResultPayload, StyleInfo,
};
use crate::reveal::{self, ResultStage, RevealStage, RoundResult};
use crate::room::RoomState;
use crate::sequence::{Cue, SequencePlayer, Stage};
use crate::validate::{DefaultValidator, ValidationError, Validator};

/// Number of selectable avatars; ids run from 1.
pub const AVATAR_COUNT: u32 = 12;

/// Progress indicator value while the group votes for the spy.
const PROGRESS_VOTING: u32 = 3;
/// Progress indicator value while the spy guesses the keyword.
const PROGRESS_SPY_GUESS: u32 = 4;

// ── Phase ───────────────────────────────────────────────────────────

/// The stage of the round the client is displaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Lobby,
    TopicVoting,
    Drawing,
    ArtworkSelection,
    ArtworkShowing,
    SpyVoting,
    SpyRevealSequence,
    SpyGuess,
    ResultSequence,
    Gallery,
}

impl Phase {
    /// The phase a resuming client lands in for a server-reported phase.
    pub fn from_server(phase: ServerPhase) -> Self {
        match phase {
            ServerPhase::Waiting => Self::Lobby,
            ServerPhase::VotingTopic | ServerPhase::ShowTopic => Self::TopicVoting,
            ServerPhase::Drawing => Self::Drawing,
            ServerPhase::ShowArt => Self::ArtworkShowing,
            ServerPhase::Voting => Self::SpyVoting,
            ServerPhase::SpyGuess => Self::SpyGuess,
            ServerPhase::Ended => Self::Gallery,
        }
    }

    /// The server's name for the part of the round this phase belongs to.
    pub fn server_phase(self) -> ServerPhase {
        match self {
            Self::Lobby => ServerPhase::Waiting,
            Self::TopicVoting => ServerPhase::VotingTopic,
            Self::Drawing | Self::ArtworkSelection => ServerPhase::Drawing,
            Self::ArtworkShowing => ServerPhase::ShowArt,
            Self::SpyVoting | Self::SpyRevealSequence => ServerPhase::Voting,
            Self::SpyGuess => ServerPhase::SpyGuess,
            Self::ResultSequence | Self::Gallery => ServerPhase::Ended,
        }
    }
}

// ── Intents ─────────────────────────────────────────────────────────

/// Something the player asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CreateRoom { player_name: String },
    JoinRoom { room_id: String, player_name: String },
    ChangeAvatar(u32),
    /// Host only: start the topic vote.
    StartRound,
    ChooseTopic(usize),
    SelectStyle(u32),
    SubmitPrompt(String),
    /// Pick which of the player's own images to show on their turn.
    SelectArt(usize),
    VoteSpy(PlayerId),
    GuessKeyword(String),
    PlayAgain,
    LeaveRoom,
    /// Ask for the saved seat back after a reconnect.
    Rejoin,
}

// ── Round data ──────────────────────────────────────────────────────

/// What the client has learned about the current round.
#[derive(Debug, Clone, Default)]
pub struct RoundInfo {
    pub round: u32,
    pub topics: Vec<String>,
    pub topic: Option<String>,
    /// `None` for the spy.
    pub keyword: Option<String>,
    pub styles: Vec<StyleInfo>,
    pub selected_style: Option<u32>,
    /// Set by `drawing_finished`; artwork is only requested after it.
    pub art_window_open: bool,
    pub artwork: Vec<String>,
    pub showing: Option<ShowingPayload>,
    /// Revealed artworks in reveal order.
    pub showcase: Vec<(PlayerId, String)>,
    pub vote_result: Option<SpyVoteResultPayload>,
    pub caught: Option<bool>,
    pub ended: Option<GameEndedPayload>,
    pub countdown: Option<u32>,
}

impl RoundInfo {
    fn style_id(style: &StyleInfo, index: usize) -> u32 {
        style
            .id
            .unwrap_or_else(|| u32::try_from(index).unwrap_or(u32::MAX))
    }

    fn has_style(&self, id: u32) -> bool {
        self.styles
            .iter()
            .enumerate()
            .any(|(i, s)| Self::style_id(s, i) == id)
    }

    fn default_style(&self) -> u32 {
        self.styles
            .first()
            .map_or(0, |s| Self::style_id(s, 0))
    }
}

/// Receivers on which stage timers deliver their cues.
#[derive(Debug)]
pub struct CueReceivers {
    pub reveal: UnboundedReceiver<Cue<RevealStage>>,
    pub result: UnboundedReceiver<Cue<ResultStage>>,
    pub countdown: UnboundedReceiver<Cue<u32>>,
}

// ── Machine ─────────────────────────────────────────────────────────

/// The single authority for the current phase.
pub struct PhaseMachine {
    config: GameConfig,
    phase: Phase,
    room: Option<RoomState>,
    round: RoundInfo,
    gate: ActionGate,
    presenter: Box<dyn Presenter>,
    effects: Box<dyn EffectsPlayer>,
    validator: Box<dyn Validator>,
    session: SessionCache,
    reveal: SequencePlayer<RevealStage>,
    result: SequencePlayer<ResultStage>,
    countdown: SequencePlayer<u32>,
}

impl std::fmt::Debug for PhaseMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseMachine")
            .field("phase", &self.phase)
            .field("room", &self.room.as_ref().map(RoomState::room_id))
            .field("round", &self.round.round)
            .finish_non_exhaustive()
    }
}

impl PhaseMachine {
    /// Create a machine in [`Phase::Lobby`] with no room.
    pub fn new(
        config: GameConfig,
        presenter: Box<dyn Presenter>,
        effects: Box<dyn EffectsPlayer>,
        prefs: Box<dyn Preferences>,
    ) -> (Self, CueReceivers) {
        let (reveal, reveal_rx) = SequencePlayer::new();
        let (result, result_rx) = SequencePlayer::new();
        let (countdown, countdown_rx) = SequencePlayer::new();
        let mut machine = Self {
            gate: config.build_gate(),
            config,
            phase: Phase::Lobby,
            room: None,
            round: RoundInfo::default(),
            presenter,
            effects,
            validator: Box::new(DefaultValidator),
            session: SessionCache::new(prefs),
            reveal,
            result,
            countdown,
        };
        let cues = CueReceivers {
            reveal: reveal_rx,
            result: result_rx,
            countdown: countdown_rx,
        };
        let volume = machine.session.audio_volume();
        machine.effects.set_volume(volume);
        (machine, cues)
    }

    /// Replace the input validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn room(&self) -> Option<&RoomState> {
        self.room.as_ref()
    }

    pub fn round(&self) -> &RoundInfo {
        &self.round
    }

    pub fn gate(&self) -> &ActionGate {
        &self.gate
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Whether the start button should be enabled for this client.
    pub fn can_start_game(&self) -> bool {
        self.phase == Phase::Lobby
            && self
                .room
                .as_ref()
                .is_some_and(|r| r.can_start_game(self.config.min_players))
    }

    /// The cached session, if one was saved.
    pub fn saved_session(&self) -> Option<SavedSession> {
        self.session.load()
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.session.set_audio_enabled(enabled);
    }

    pub fn audio_volume(&self) -> f64 {
        self.session.audio_volume()
    }

    /// Store the volume and pass it on to the effects player.
    pub fn set_audio_volume(&mut self, volume: f64) {
        self.session.set_audio_volume(volume);
        let volume = self.session.audio_volume();
        self.effects.set_volume(volume);
    }

    // ── Inbound events ──────────────────────────────────────────────

    /// Apply one server event. Returns the actions the event requires.
    pub fn handle(&mut self, msg: ServerMessage) -> Vec<ClientMessage> {
        debug!(event = %msg.kind(), phase = ?self.phase, "handling server event");
        let mut follow_up = Vec::new();

        match msg {
            ServerMessage::Connected { message } => {
                debug!(?message, "server greeting");
            }
            ServerMessage::Pong => {}
            ServerMessage::RoomCreated(payload) | ServerMessage::JoinRoomSuccess(payload) => {
                self.on_joined(payload);
                follow_up.push(ClientMessage::GetRoomInfo {});
            }
            ServerMessage::RoomInfo(payload) => self.on_room_info(payload),
            ServerMessage::RoomRejoined(payload) => self.on_rejoined(payload),
            ServerMessage::PlayerJoined { player, players } => {
                let name = player
                    .as_ref()
                    .map(|p| p.name.clone())
                    .or_else(|| players.last().map(|p| p.name.clone()));
                let Some(room) = self.room.as_mut() else {
                    warn!("player_joined before entering a room; ignored");
                    return follow_up;
                };
                room.apply_joined(player, players);
                self.render_roster();
                if let Some(name) = name {
                    self.notify(Notice::info(format!("{name} joined the room")));
                }
            }
            ServerMessage::PlayerLeft {
                player_id,
                player_name,
                players,
            } => {
                let Some(room) = self.room.as_mut() else {
                    warn!("player_left before entering a room; ignored");
                    return follow_up;
                };
                let name = player_name.or_else(|| {
                    player_id
                        .as_deref()
                        .and_then(|id| room.player(id))
                        .map(|p| p.name.clone())
                });
                room.apply_left(player_id.as_deref(), players);
                self.render_roster();
                if let Some(name) = name {
                    self.notify(Notice::info(format!("{name} left the room")));
                }
            }
            ServerMessage::AvatarChanged {
                player_id,
                avatar_id,
            } => {
                let patched = self
                    .room
                    .as_mut()
                    .is_some_and(|room| room.patch_avatar(&player_id, avatar_id));
                if patched {
                    self.render(ViewUpdate::AvatarChanged {
                        player_id,
                        avatar_id,
                    });
                } else {
                    warn!(%player_id, "avatar change for unknown player");
                }
            }
            ServerMessage::StartVotingTopic { topics, players } => {
                self.on_topic_vote(topics, players);
            }
            ServerMessage::GameStarted(payload) => self.on_game_started(payload),
            ServerMessage::WriteDrawingPrompt { round } => {
                self.round.round = round.unwrap_or(self.round.round.saturating_add(1));
                self.round.art_window_open = false;
                self.round.artwork.clear();
                self.enter(Phase::Drawing);
                self.render(ViewUpdate::ShowArea(Area::DrawingInput));
                self.render(ViewUpdate::ShowInterface(Interface::Drawing));
                self.render(ViewUpdate::Progress(self.round.round));
            }
            ServerMessage::DrawingStarted { message } => {
                self.render(ViewUpdate::ShowInterface(Interface::DrawingWaiting));
                if let Some(message) = message {
                    self.notify(Notice::info(message));
                }
            }
            ServerMessage::DrawingError { message } => {
                self.notify(Notice::error(
                    message.unwrap_or_else(|| "drawing failed, please try again".into()),
                ));
                self.render(ViewUpdate::ShowInterface(Interface::Drawing));
            }
            ServerMessage::DrawingFinished { players } => {
                self.sync_roster_if_present(players);
                self.round.art_window_open = true;
                self.enter(Phase::ArtworkSelection);
                self.render(ViewUpdate::ShowInterface(Interface::ArtworkWaiting));
                follow_up.push(ClientMessage::GetMyArt {});
            }
            ServerMessage::MyArt { round, image_data } => {
                if !self.round.art_window_open {
                    debug!("my_art arrived before drawing_finished");
                }
                if let Some(round) = round {
                    self.round.round = round;
                }
                self.round.artwork.clone_from(&image_data);
                self.enter(Phase::ArtworkSelection);
                self.render(ViewUpdate::ArtworkOptions(image_data));
                self.render(ViewUpdate::ShowInterface(Interface::ArtworkSelect));
                follow_up.push(ClientMessage::ArtReceived {});
            }
            ServerMessage::StartShowing(payload) => self.on_start_showing(payload),
            ServerMessage::ArtSelected(payload) => self.on_art_selected(payload),
            ServerMessage::StartVotingSpy { players, round } => {
                self.sync_roster_if_present(players);
                if let Some(round) = round {
                    self.round.round = round;
                }
                self.enter(Phase::SpyVoting);
                self.show_spy_voting();
                self.start_countdown();
            }
            ServerMessage::VotingSpyResult(payload) => self.on_vote_result(payload),
            ServerMessage::GameEnded(payload) => self.on_game_ended(payload),
            ServerMessage::PlayerPlayAgain { player_id } => {
                let name = match self.room.as_mut() {
                    Some(room) => {
                        room.mark_ready(&player_id);
                        room.name_of(&player_id).to_string()
                    }
                    None => player_id.clone(),
                };
                self.render(ViewUpdate::RematchReady(player_id));
                self.notify(Notice::info(format!("{name} wants to play again")));
            }
            ServerMessage::Error { message } => {
                if let Some(key) = self.gate.on_server_error() {
                    debug!(?key, "guard released after server error");
                }
                self.notify(Notice::error(
                    message.unwrap_or_else(|| "unknown server error".into()),
                ));
            }
        }

        follow_up
    }

    /// Surface a dropped connection. The phase is left alone; the server's
    /// next event after reconnection resynchronizes.
    pub fn on_disconnected(&mut self, reason: Option<&str>) {
        let message = match reason {
            Some(reason) => format!("connection lost: {reason}"),
            None => "connection lost".to_string(),
        };
        self.notify(Notice::warning(message));
    }

    /// Show a transient notice.
    pub fn notify(&mut self, notice: Notice) {
        self.play(Effect::Notify);
        self.render(ViewUpdate::Notice(notice));
    }

    // ── Event handlers ──────────────────────────────────────────────

    fn on_joined(&mut self, payload: JoinedPayload) {
        let JoinedPayload {
            room_id,
            player,
            mut players,
        } = payload;
        if players.is_empty() {
            players.push(player.clone());
        }
        info!(%room_id, player = %player.id, "entered room");
        self.session.save_room(&room_id, &player);
        self.room = Some(RoomState::new(room_id.clone(), player.id.clone(), players));
        self.round = RoundInfo::default();
        self.enter(Phase::Lobby);
        self.render(ViewUpdate::RoomEntered {
            room_id,
            self_id: player.id,
        });
        self.render(ViewUpdate::ShowContainer(Container::Room));
        self.render_roster();
    }

    fn on_room_info(&mut self, payload: RoomInfoPayload) {
        let Some(room) = self.room.as_mut() else {
            warn!(room_id = %payload.room_id, "room_info before entering a room; ignored");
            return;
        };
        if room.room_id() != payload.room_id {
            warn!(ours = %room.room_id(), theirs = %payload.room_id, "room_info for another room");
        }
        room.sync_roster(payload.players);
        if let Some(round) = payload.current_round {
            self.round.round = round;
        }
        self.render_roster();
        if let Some(phase) = payload.phase {
            self.resume(phase);
        }
    }

    fn on_rejoined(&mut self, payload: RejoinedPayload) {
        let RejoinedPayload {
            room_id,
            player,
            mut players,
            phase,
            current_round,
        } = payload;
        if players.is_empty() {
            players.push(player.clone());
        }
        info!(%room_id, player = %player.id, "rejoined room");
        self.session.save_room(&room_id, &player);
        self.room = Some(RoomState::new(room_id.clone(), player.id.clone(), players));
        if let Some(round) = current_round {
            self.round.round = round;
        }
        self.render(ViewUpdate::RoomEntered {
            room_id,
            self_id: player.id,
        });
        self.render_roster();
        self.resume(phase.unwrap_or(ServerPhase::Waiting));
    }

    fn on_topic_vote(&mut self, topics: Vec<String>, players: Vec<Player>) {
        if let Some(room) = self.room.as_mut() {
            room.reset_round();
        }
        self.sync_roster_if_present(players);
        self.round = RoundInfo {
            topics: topics.clone(),
            ..RoundInfo::default()
        };
        self.enter(Phase::TopicVoting);
        self.render(ViewUpdate::ShowContainer(Container::GameTable));
        self.render(ViewUpdate::TopicOptions(topics));
        self.render(ViewUpdate::ShowArea(Area::SubjectVote));
    }

    fn on_game_started(&mut self, payload: GameStartedPayload) {
        let GameStartedPayload {
            topic,
            keyword,
            is_spy,
            round,
            styles,
        } = payload;
        if let Some(room) = self.room.as_mut() {
            room.set_spy_flag(is_spy);
        }
        self.round.round = round;
        self.round.topic = Some(topic.clone());
        self.round.keyword.clone_from(&keyword);
        self.round.styles.clone_from(&styles);
        self.round.selected_style = None;
        self.enter(Phase::Drawing);
        self.render(ViewUpdate::ShowContainer(Container::GameTable));
        self.render(ViewUpdate::TopicAnnounced {
            topic,
            keyword,
            is_spy,
            round,
        });
        self.render(ViewUpdate::ShowArea(Area::SubjectAnnouncement));
        self.render(ViewUpdate::StyleCatalog(styles));
        self.render(ViewUpdate::ShowInterface(Interface::Drawing));
        self.render(ViewUpdate::Progress(round));
    }

    fn on_start_showing(&mut self, payload: ShowingPayload) {
        self.sync_roster_if_present(payload.players.clone());
        self.enter(Phase::ArtworkShowing);
        match payload.current_turn() {
            Some(turn) => {
                let is_mine = self.is_me(turn);
                let update = ViewUpdate::ShowingTurn {
                    player_id: turn.clone(),
                    player_name: self.name_of(turn),
                    is_mine,
                    show_time: payload.show_time,
                };
                self.render(update);
                self.render(ViewUpdate::ShowInterface(Interface::ArtDisplay));
                self.render(ViewUpdate::ShowArea(if is_mine {
                    Area::ArtSelect
                } else {
                    Area::ArtWaiting
                }));
            }
            None => warn!(
                now_showing = payload.now_showing,
                order = payload.show_art_order.len(),
                "showing turn out of range"
            ),
        }
        self.round.showing = Some(payload);
    }

    fn on_art_selected(&mut self, payload: ArtSelectedPayload) {
        let ArtSelectedPayload {
            player_id,
            selected_art,
            players,
            ..
        } = payload;
        self.sync_roster_if_present(players);
        let player_name = self.name_of(&player_id);
        self.round
            .showcase
            .push((player_id.clone(), selected_art.clone()));
        self.render(ViewUpdate::ArtworkRevealed {
            player_id,
            player_name,
            image: selected_art,
        });
        self.render(ViewUpdate::ShowArea(Area::ArtShow));
    }

    fn on_vote_result(&mut self, payload: SpyVoteResultPayload) {
        let caught = outcome::group_caught_spy(&payload);
        let seats: Vec<PlayerId> = match self.room.as_mut() {
            Some(room) => {
                room.reveal_spy(payload.spy_is.clone());
                room.players().iter().map(|p| p.id.clone()).collect()
            }
            None => Vec::new(),
        };
        info!(spy = %payload.spy_is, caught, "spy vote result");
        let stages = reveal::spy_reveal_stages(&payload, &seats, &self.config.timings);
        self.round.caught = Some(caught);
        self.round.vote_result = Some(payload);
        self.enter(Phase::SpyRevealSequence);
        self.reveal.start(stages);
    }

    fn on_game_ended(&mut self, payload: GameEndedPayload) {
        let caught = self
            .round
            .caught
            .or_else(|| payload.win_type.map(|w| w.spy_was_caught()))
            .unwrap_or(false);
        let guessed = payload.spy_guessed_correctly();
        if let Some(server_win) = payload.win_type {
            let local = outcome::WinType::classify(caught, guessed);
            if server_win != local {
                debug!(?server_win, ?local, "server win type differs from local classification");
            }
        }
        let stages = {
            let (spy_id, roster) = match &self.room {
                Some(room) => (room.spy_id(), room.players()),
                None => (None, &[][..]),
            };
            reveal::result_stages(
                &RoundResult {
                    spy_guess: &payload.spy_guess,
                    keyword: &payload.correct_answer,
                    guessed_correctly: guessed,
                    caught,
                    spy_id,
                    roster,
                    gallery: &payload.gallery,
                },
                &self.config.timings,
            )
        };
        self.round.ended = Some(payload);
        self.enter(Phase::ResultSequence);
        self.result.start(stages);
    }

    /// Jump straight to the phase a reconnecting client belongs in.
    fn resume(&mut self, phase: ServerPhase) {
        let target = Phase::from_server(phase);
        if target == self.phase {
            debug!(?target, "resume: already in phase");
            return;
        }
        info!(server_phase = %phase, ?target, "resuming");
        self.enter(target);
        match phase {
            ServerPhase::Waiting => {
                self.render(ViewUpdate::ShowContainer(Container::Room));
                self.render_roster();
            }
            ServerPhase::VotingTopic => {
                self.render(ViewUpdate::ShowContainer(Container::GameTable));
                self.render(ViewUpdate::ShowArea(Area::SubjectVote));
            }
            ServerPhase::ShowTopic => {
                self.render(ViewUpdate::ShowContainer(Container::GameTable));
                self.render(ViewUpdate::ShowArea(Area::SubjectAnnouncement));
            }
            ServerPhase::Drawing => {
                self.render(ViewUpdate::ShowContainer(Container::GameTable));
                self.render(ViewUpdate::ShowInterface(Interface::Drawing));
                self.render(ViewUpdate::Progress(self.round.round.max(1)));
            }
            ServerPhase::ShowArt => {
                self.render(ViewUpdate::ShowContainer(Container::GameTable));
                self.render(ViewUpdate::ShowInterface(Interface::ArtDisplay));
            }
            ServerPhase::Voting => {
                self.render(ViewUpdate::ShowContainer(Container::GameTable));
                self.show_spy_voting();
                self.start_countdown();
            }
            ServerPhase::SpyGuess => {
                self.render(ViewUpdate::ShowContainer(Container::GameTable));
                self.show_spy_guess();
            }
            ServerPhase::Ended => {
                self.render(ViewUpdate::ShowContainer(Container::Gallery));
            }
        }
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Enter `target`: stop timers that belong to other phases, re-arm the
    /// guards it owns and remember it in the session cache.
    fn enter(&mut self, target: Phase) {
        let from = self.phase;
        if target != Phase::SpyRevealSequence {
            self.reveal.cancel();
        }
        if target != Phase::ResultSequence {
            self.result.cancel();
        }
        if target != Phase::SpyVoting {
            self.countdown.cancel();
            self.round.countdown = None;
        }
        self.phase = target;
        self.gate.enter_phase(target);
        self.session.save_phase(target.server_phase().as_str());
        if from != target {
            info!(?from, to = ?target, "phase transition");
            self.render(ViewUpdate::PhaseChanged { from, to: target });
        }
    }

    fn show_spy_voting(&mut self) {
        self.render(ViewUpdate::ShowInterface(Interface::SpyVoting));
        self.render(ViewUpdate::Progress(PROGRESS_VOTING));
        let candidates = self
            .room
            .as_ref()
            .map(|room| {
                room.players()
                    .iter()
                    .filter(|p| p.id != room.self_id())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        self.render(ViewUpdate::VoteCandidates(candidates));
    }

    fn show_spy_guess(&mut self) {
        let options = self
            .round
            .vote_result
            .as_ref()
            .map(|r| r.spy_options.clone())
            .unwrap_or_default();
        let can_guess = self.room.as_ref().is_some_and(RoomState::is_spy);
        self.render(ViewUpdate::ShowInterface(Interface::SpyGuess));
        self.render(ViewUpdate::Progress(PROGRESS_SPY_GUESS));
        self.render(ViewUpdate::SpyGuessPrompt { options, can_guess });
    }

    fn start_countdown(&mut self) {
        let Some(total) = self.config.vote_countdown else {
            return;
        };
        let secs = u32::try_from(total.as_secs()).unwrap_or(u32::MAX);
        let stages = (0..=secs)
            .rev()
            .map(|left| {
                let delay = if left == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_secs(1)
                };
                Stage::fixed(left, delay)
            })
            .collect();
        self.round.countdown = Some(secs);
        self.countdown.start(stages);
    }

    // ── Cues ────────────────────────────────────────────────────────

    /// Apply one spy reveal stage.
    pub fn on_reveal_cue(&mut self, cue: Cue<RevealStage>) {
        if !self.reveal.is_current(cue.run) || self.phase != Phase::SpyRevealSequence {
            warn!(run = cue.run, stage = cue.index, "stale reveal cue dropped");
            return;
        }
        match cue.effect {
            RevealStage::ShowTally => {
                let (counts, voters) = self
                    .round
                    .vote_result
                    .as_ref()
                    .map(|r| (r.vote_counts.clone(), r.vote_results.clone()))
                    .unwrap_or_default();
                self.render(ViewUpdate::ShowInterface(Interface::RealSpy));
                self.render(ViewUpdate::VoteTally { counts, voters });
            }
            RevealStage::RevealSpy {
                spy_id,
                caught,
                roulette,
                ..
            } => {
                self.play(Effect::RouletteSpin);
                let spy_name = self.name_of(&spy_id);
                self.render(ViewUpdate::SpyRevealed {
                    spy_id,
                    spy_name,
                    caught,
                    roulette,
                });
                self.play(if caught {
                    Effect::SpyCaught
                } else {
                    Effect::SpyEscaped
                });
            }
            RevealStage::HoldReveal => {}
            RevealStage::ClearTally => self.render(ViewUpdate::TallyCleared),
            RevealStage::EnterSpyGuess => {
                self.enter(Phase::SpyGuess);
                self.show_spy_guess();
            }
        }
    }

    /// Apply one result stage.
    pub fn on_result_cue(&mut self, cue: Cue<ResultStage>) {
        if !self.result.is_current(cue.run) || self.phase != Phase::ResultSequence {
            warn!(run = cue.run, stage = cue.index, "stale result cue dropped");
            return;
        }
        match cue.effect {
            ResultStage::ShowSpyGuess(guess) => {
                self.render(ViewUpdate::ShowInterface(Interface::SpyGuessResult));
                self.render(ViewUpdate::SpyGuessShown(guess));
            }
            ResultStage::RevealKeyword(keyword) => {
                self.render(ViewUpdate::KeywordRevealed(keyword));
            }
            ResultStage::Verdict { correct } => {
                self.render(ViewUpdate::Verdict { correct });
                self.play(if correct {
                    Effect::GuessCorrect
                } else {
                    Effect::GuessWrong
                });
            }
            ResultStage::ClearVerdict => self.render(ViewUpdate::VerdictCleared),
            ResultStage::ShowOutcome {
                win,
                winners,
                spy_id,
            } => {
                let won = self
                    .room
                    .as_ref()
                    .is_some_and(|room| winners.iter().any(|w| w == room.self_id()));
                self.render(ViewUpdate::ShowInterface(Interface::GameResult));
                self.render(ViewUpdate::Outcome {
                    win,
                    winners,
                    spy_id,
                });
                self.play(if won { Effect::Victory } else { Effect::Defeat });
            }
            ResultStage::ShowGallery(entries) => {
                self.enter(Phase::Gallery);
                self.render(ViewUpdate::ShowContainer(Container::Gallery));
                self.render(ViewUpdate::Gallery(entries));
            }
        }
    }

    /// Apply one countdown tick. Returns an automatic vote when time runs out
    /// before the player voted.
    pub fn on_countdown_cue(&mut self, cue: Cue<u32>) -> Option<ClientMessage> {
        if !self.countdown.is_current(cue.run) || self.phase != Phase::SpyVoting {
            warn!(run = cue.run, "stale countdown cue dropped");
            return None;
        }
        let left = cue.effect;
        self.round.countdown = Some(left);
        self.render(ViewUpdate::Countdown(left));
        if left > 0 && left <= self.config.countdown_warning {
            self.play(Effect::CountdownTick);
        }
        if left > 0 || self.gate.is_consumed(ActionKey::VoteSpy) {
            return None;
        }

        let target = self.room.as_ref().and_then(|room| {
            let candidates: Vec<&Player> = room
                .players()
                .iter()
                .filter(|p| p.id != room.self_id())
                .collect();
            candidates
                .choose(&mut rand::thread_rng())
                .map(|p| (p.id.clone(), p.name.clone()))
        })?;
        info!(target = %target.0, "vote countdown elapsed; voting automatically");
        let msg = self.intent(Intent::VoteSpy(target.0))?;
        self.notify(Notice::info(format!(
            "time is up, voted for {} automatically",
            target.1
        )));
        Some(msg)
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Run an intent. Rejections are shown as an error notice.
    pub fn intent(&mut self, intent: Intent) -> Option<ClientMessage> {
        match self.try_intent(intent) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("intent rejected: {e}");
                self.notify(Notice::error(e.to_string()));
                None
            }
        }
    }

    /// Run an intent.
    ///
    /// Returns `Ok(None)` when a guarded action was already sent in this
    /// phase, and `Err` when the input is invalid; neither consumes a guard.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] that rejected the input.
    pub fn try_intent(
        &mut self,
        intent: Intent,
    ) -> Result<Option<ClientMessage>, ValidationError> {
        match intent {
            Intent::CreateRoom { player_name } => {
                self.validator.player_name(&player_name)?;
                Ok(Some(ClientMessage::CreateRoom {
                    player_name: player_name.trim().to_string(),
                }))
            }
            Intent::JoinRoom {
                room_id,
                player_name,
            } => {
                let room_id = room_id.trim().to_ascii_uppercase();
                self.validator.room_code(&room_id)?;
                self.validator.player_name(&player_name)?;
                Ok(Some(ClientMessage::JoinRoom {
                    room_id,
                    player_name: player_name.trim().to_string(),
                }))
            }
            Intent::ChangeAvatar(avatar_id) => {
                self.require_room()?;
                if !(1..=AVATAR_COUNT).contains(&avatar_id) {
                    return Err(ValidationError::OptionOutOfRange {
                        index: usize::try_from(avatar_id).unwrap_or(usize::MAX),
                        available: AVATAR_COUNT as usize,
                    });
                }
                Ok(Some(ClientMessage::ChangeAvatar { avatar_id }))
            }
            Intent::StartRound => {
                self.require_phase(Phase::Lobby)?;
                let room = self.require_room()?;
                if !room.is_host() {
                    return Err(ValidationError::NotHost);
                }
                if room.len() < self.config.min_players {
                    return Err(ValidationError::NotEnoughPlayers {
                        min: self.config.min_players,
                        have: room.len(),
                    });
                }
                if room.len() > self.config.max_players {
                    return Err(ValidationError::RoomFull {
                        max: self.config.max_players,
                    });
                }
                Ok(Some(ClientMessage::TopicVoteStart {}))
            }
            Intent::ChooseTopic(index) => {
                self.require_phase(Phase::TopicVoting)?;
                check_index(index, self.round.topics.len())?;
                Ok(self.guarded(
                    ActionKey::ChooseTopic,
                    ClientMessage::TopicVoted {
                        selected_topic_no: index,
                    },
                ))
            }
            Intent::SelectStyle(style_id) => {
                self.require_phase(Phase::Drawing)?;
                if !self.round.has_style(style_id) {
                    return Err(ValidationError::OptionOutOfRange {
                        index: usize::try_from(style_id).unwrap_or(usize::MAX),
                        available: self.round.styles.len(),
                    });
                }
                self.round.selected_style = Some(style_id);
                self.render(ViewUpdate::StyleSelected(style_id));
                Ok(None)
            }
            Intent::SubmitPrompt(prompt) => {
                self.require_phase(Phase::Drawing)?;
                let prompt = prompt.trim();
                if prompt.is_empty() {
                    return Err(ValidationError::EmptyPrompt);
                }
                let style_id = self
                    .round
                    .selected_style
                    .unwrap_or_else(|| self.round.default_style());
                Ok(Some(ClientMessage::SubmitDrawingPrompt {
                    prompt: prompt.to_string(),
                    style_id,
                }))
            }
            Intent::SelectArt(index) => {
                self.require_phase(Phase::ArtworkShowing)?;
                let my_turn = self
                    .round
                    .showing
                    .as_ref()
                    .and_then(ShowingPayload::current_turn)
                    .is_some_and(|turn| self.is_me(turn));
                if !my_turn {
                    return Err(ValidationError::NotYourTurn);
                }
                check_index(index, self.round.artwork.len())?;
                Ok(self.guarded(
                    ActionKey::SelectArt,
                    ClientMessage::SelectedArt {
                        selected_art_no: index,
                    },
                ))
            }
            Intent::VoteSpy(target) => {
                self.require_phase(Phase::SpyVoting)?;
                let room = self.require_room()?;
                if target == room.self_id() {
                    return Err(ValidationError::SelfVote);
                }
                if !room.contains(&target) {
                    return Err(ValidationError::UnknownPlayer(target));
                }
                let msg = self.guarded(
                    ActionKey::VoteSpy,
                    ClientMessage::SubmitSpyVote {
                        voted_player_id: target,
                    },
                );
                if msg.is_some() {
                    self.countdown.cancel();
                }
                Ok(msg)
            }
            Intent::GuessKeyword(word) => {
                self.require_phase(Phase::SpyGuess)?;
                if !self.require_room()?.is_spy() {
                    return Err(ValidationError::NotSpy);
                }
                let word = word.trim();
                if word.is_empty() {
                    return Err(ValidationError::EmptyGuess);
                }
                Ok(self.guarded(
                    ActionKey::GuessSpyWord,
                    ClientMessage::SpyGuess {
                        guessed_keyword: word.to_string(),
                    },
                ))
            }
            Intent::PlayAgain => {
                if !matches!(self.phase, Phase::ResultSequence | Phase::Gallery) {
                    return Err(ValidationError::WrongPhase);
                }
                Ok(self.guarded(ActionKey::RequestRematch, ClientMessage::PlayAgain {}))
            }
            Intent::LeaveRoom => {
                self.require_room()?;
                self.leave_room();
                Ok(Some(ClientMessage::LeaveRoom {}))
            }
            Intent::Rejoin => {
                let saved = self.session.load().ok_or(ValidationError::NoSession)?;
                Ok(Some(ClientMessage::RejoinRoom {
                    room_id: saved.room_id,
                    player_id: saved.player.id,
                }))
            }
        }
    }

    fn guarded(&mut self, key: ActionKey, msg: ClientMessage) -> Option<ClientMessage> {
        if self.gate.try_consume(key) {
            Some(msg)
        } else {
            debug!(?key, "duplicate submission suppressed");
            None
        }
    }

    fn leave_room(&mut self) {
        self.session.clear();
        self.room = None;
        self.round = RoundInfo::default();
        self.enter(Phase::Lobby);
        self.render(ViewUpdate::ShowContainer(Container::Homepage));
    }

    fn require_phase(&self, phase: Phase) -> Result<(), ValidationError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(ValidationError::WrongPhase)
        }
    }

    fn require_room(&self) -> Result<&RoomState, ValidationError> {
        self.room.as_ref().ok_or(ValidationError::NotInRoom)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn sync_roster_if_present(&mut self, players: Vec<Player>) {
        if players.is_empty() {
            return;
        }
        if let Some(room) = self.room.as_mut() {
            room.sync_roster(players);
            self.render_roster();
        }
    }

    fn render_roster(&mut self) {
        let update = match &self.room {
            Some(room) => ViewUpdate::Roster {
                players: room.players().to_vec(),
                self_id: room.self_id().to_string(),
                can_start: self.phase == Phase::Lobby
                    && room.can_start_game(self.config.min_players),
            },
            None => return,
        };
        self.render(update);
    }

    fn is_me(&self, id: &str) -> bool {
        self.room.as_ref().is_some_and(|r| r.self_id() == id)
    }

    fn name_of(&self, id: &str) -> String {
        self.room
            .as_ref()
            .map_or(id, |r| r.name_of(id))
            .to_string()
    }

    fn render(&mut self, update: ViewUpdate) {
        self.presenter.render(update);
    }

    fn play(&mut self, effect: Effect) {
        if self.session.audio_enabled() {
            self.effects.play(effect);
        }
    }
}

fn check_index(index: usize, available: usize) -> Result<(), ValidationError> {
    if index < available {
        Ok(())
    } else {
        Err(ValidationError::OptionOutOfRange { index, available })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::config::RevealTimings;
    use crate::prefs::{MemoryPreferences, PreferencesExt, GAME_PHASE};
    use crate::presentation::Recorder;
    use crate::protocol::JoinedPayload;

    fn machine_with(config: GameConfig) -> (PhaseMachine, CueReceivers, Recorder, MemoryPreferences) {
        let recorder = Recorder::new();
        let prefs = MemoryPreferences::new();
        let (machine, cues) = PhaseMachine::new(
            config,
            Box::new(recorder.clone()),
            Box::new(recorder.clone()),
            Box::new(prefs.clone()),
        );
        (machine, cues, recorder, prefs)
    }

    fn machine() -> (PhaseMachine, CueReceivers, Recorder, MemoryPreferences) {
        machine_with(GameConfig::default().with_timings(RevealTimings::instant()))
    }

    fn players(ids: &[&str]) -> Vec<Player> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Player::new(*id, id.to_uppercase()).with_host(i == 0))
            .collect()
    }

    fn join(machine: &mut PhaseMachine, me: &str, roster: &[&str]) {
        let roster = players(roster);
        let me = roster.iter().find(|p| p.id == me).cloned().unwrap();
        let out = machine.handle(ServerMessage::JoinRoomSuccess(JoinedPayload {
            room_id: "AB12CD34".into(),
            player: me,
            players: roster,
        }));
        assert_eq!(out, vec![ClientMessage::GetRoomInfo {}]);
    }

    #[tokio::test]
    async fn join_establishes_room_and_session() {
        let (mut m, _cues, recorder, prefs) = machine();
        join(&mut m, "p2", &["p1", "p2"]);

        let room = m.room().unwrap();
        assert_eq!(room.self_id(), "p2");
        assert_eq!(room.room_id(), "AB12CD34");
        assert_eq!(m.phase(), Phase::Lobby);
        assert!(recorder
            .updates()
            .contains(&ViewUpdate::ShowContainer(Container::Room)));
        assert_eq!(m.saved_session().unwrap().room_id, "AB12CD34");
        assert_eq!(prefs.get_or(GAME_PHASE, String::new()), "waiting");
    }

    #[tokio::test]
    async fn resume_to_voting_shows_spy_voting() {
        let (mut m, _cues, recorder, _prefs) = machine();
        join(&mut m, "p1", &["p1", "p2", "p3"]);
        recorder.take_updates();

        m.handle(ServerMessage::RoomInfo(RoomInfoPayload {
            room_id: "AB12CD34".into(),
            phase: Some(ServerPhase::Voting),
            players: players(&["p1", "p2", "p3"]),
            current_round: Some(2),
        }));

        assert_eq!(m.phase(), Phase::SpyVoting);
        let updates = recorder.updates();
        assert!(updates.contains(&ViewUpdate::ShowContainer(Container::GameTable)));
        assert!(updates.contains(&ViewUpdate::ShowInterface(Interface::SpyVoting)));
        assert!(updates.contains(&ViewUpdate::Progress(3)));
    }

    #[tokio::test]
    async fn resume_to_current_phase_is_a_no_op() {
        let (mut m, _cues, recorder, _prefs) = machine();
        join(&mut m, "p1", &["p1", "p2", "p3"]);
        recorder.take_updates();

        m.handle(ServerMessage::RoomInfo(RoomInfoPayload {
            room_id: "AB12CD34".into(),
            phase: Some(ServerPhase::Waiting),
            players: players(&["p1", "p2", "p3"]),
            current_round: None,
        }));

        assert_eq!(m.phase(), Phase::Lobby);
        assert!(!recorder
            .updates()
            .iter()
            .any(|u| matches!(u, ViewUpdate::PhaseChanged { .. })));
    }

    #[tokio::test]
    async fn validation_failure_consumes_no_guard() {
        let (mut m, _cues, recorder, _prefs) = machine();
        join(&mut m, "p1", &["p1", "p2", "p3"]);
        m.handle(ServerMessage::StartVotingSpy {
            players: vec![],
            round: None,
        });

        assert_eq!(
            m.try_intent(Intent::VoteSpy("p1".into())),
            Err(ValidationError::SelfVote)
        );
        assert_eq!(m.intent(Intent::VoteSpy("ghost".into())), None);
        assert!(!m.gate().is_consumed(ActionKey::VoteSpy));
        assert!(recorder
            .updates()
            .iter()
            .any(|u| matches!(u, ViewUpdate::Notice(n) if n.message.contains("ghost"))));

        let msg = m.intent(Intent::VoteSpy("p2".into()));
        assert_eq!(
            msg,
            Some(ClientMessage::SubmitSpyVote {
                voted_player_id: "p2".into()
            })
        );
        assert_eq!(m.intent(Intent::VoteSpy("p3".into())), None);
    }

    #[tokio::test]
    async fn server_error_keeps_vote_guard_without_release_policy() {
        let (mut m, _cues, _recorder, _prefs) = machine();
        join(&mut m, "p1", &["p1", "p2", "p3"]);
        m.handle(ServerMessage::StartVotingSpy {
            players: vec![],
            round: None,
        });
        assert!(m.intent(Intent::VoteSpy("p2".into())).is_some());

        m.handle(ServerMessage::Error {
            message: Some("vote rejected".into()),
        });
        assert_eq!(m.phase(), Phase::SpyVoting);
        assert!(m.intent(Intent::VoteSpy("p2".into())).is_none());
    }

    #[tokio::test]
    async fn release_policy_allows_retry_after_server_error() {
        let config = GameConfig::default()
            .with_timings(RevealTimings::instant())
            .with_error_policy(ActionKey::VoteSpy, crate::gate::ErrorPolicy::Release);
        let (mut m, _cues, _recorder, _prefs) = machine_with(config);
        join(&mut m, "p1", &["p1", "p2", "p3"]);
        m.handle(ServerMessage::StartVotingSpy {
            players: vec![],
            round: None,
        });
        assert!(m.intent(Intent::VoteSpy("p2".into())).is_some());
        m.handle(ServerMessage::Error { message: None });
        assert!(m.intent(Intent::VoteSpy("p3".into())).is_some());
    }

    #[tokio::test]
    async fn drawing_finished_pulls_artwork_and_my_art_acknowledges() {
        let (mut m, _cues, recorder, _prefs) = machine();
        join(&mut m, "p1", &["p1", "p2", "p3"]);
        m.handle(ServerMessage::WriteDrawingPrompt { round: Some(1) });
        assert_eq!(m.phase(), Phase::Drawing);

        let out = m.handle(ServerMessage::DrawingFinished { players: vec![] });
        assert_eq!(out, vec![ClientMessage::GetMyArt {}]);
        assert_eq!(m.phase(), Phase::ArtworkSelection);

        let out = m.handle(ServerMessage::MyArt {
            round: Some(1),
            image_data: vec!["aW1n".into(), "aW1nMg==".into()],
        });
        assert_eq!(out, vec![ClientMessage::ArtReceived {}]);
        assert_eq!(m.round().artwork.len(), 2);
        assert!(recorder
            .updates()
            .contains(&ViewUpdate::ShowInterface(Interface::ArtworkSelect)));
    }

    #[tokio::test]
    async fn start_round_requires_host_and_three_players() {
        let (mut m, _cues, _recorder, _prefs) = machine();
        join(&mut m, "p1", &["p1", "p2"]);
        assert_eq!(
            m.try_intent(Intent::StartRound),
            Err(ValidationError::NotEnoughPlayers { min: 3, have: 2 })
        );
        m.handle(ServerMessage::PlayerJoined {
            player: Some(Player::new("p3", "P3")),
            players: vec![],
        });
        assert!(m.can_start_game());
        assert_eq!(
            m.try_intent(Intent::StartRound),
            Ok(Some(ClientMessage::TopicVoteStart {}))
        );

        let (mut guest, _cues, _recorder, _prefs) = machine();
        join(&mut guest, "p2", &["p1", "p2", "p3"]);
        assert!(!guest.can_start_game());
        assert_eq!(guest.try_intent(Intent::StartRound), Err(ValidationError::NotHost));
    }

    #[tokio::test]
    async fn leave_room_clears_session() {
        let (mut m, _cues, recorder, _prefs) = machine();
        join(&mut m, "p1", &["p1", "p2"]);
        assert_eq!(m.intent(Intent::LeaveRoom), Some(ClientMessage::LeaveRoom {}));
        assert!(m.room().is_none());
        assert!(m.saved_session().is_none());
        assert_eq!(m.try_intent(Intent::Rejoin), Err(ValidationError::NoSession));
        assert!(recorder
            .updates()
            .contains(&ViewUpdate::ShowContainer(Container::Homepage)));
    }

    #[test]
    fn server_phase_mapping_covers_resume_table() {
        assert_eq!(Phase::from_server(ServerPhase::Waiting), Phase::Lobby);
        assert_eq!(Phase::from_server(ServerPhase::ShowTopic), Phase::TopicVoting);
        assert_eq!(Phase::from_server(ServerPhase::Drawing), Phase::Drawing);
        assert_eq!(Phase::from_server(ServerPhase::ShowArt), Phase::ArtworkShowing);
        assert_eq!(Phase::from_server(ServerPhase::Voting), Phase::SpyVoting);
        assert_eq!(Phase::from_server(ServerPhase::SpyGuess), Phase::SpyGuess);
        assert_eq!(Phase::from_server(ServerPhase::Ended), Phase::Gallery);
        assert_eq!(Phase::SpyRevealSequence.server_phase(), ServerPhase::Voting);
    }
}
