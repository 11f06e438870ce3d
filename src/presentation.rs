//! The seam between the phase machine and whatever draws the game.
//!
//! The machine never touches a UI toolkit. It describes what changed as
//! [`ViewUpdate`] values and asks for cosmetic sounds or particles as
//! [`Effect`] values; a [`Presenter`] and an [`EffectsPlayer`] turn those into
//! pixels and noise.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::machine::Phase;
use crate::outcome::WinType;
use crate::protocol::{GalleryEntry, Player, PlayerId, StyleInfo};
use crate::reveal::RouletteStep;

/// Top-level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Homepage,
    Room,
    GameTable,
    Gallery,
}

/// Full-table interfaces shown over the game table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    Drawing,
    DrawingWaiting,
    ArtworkWaiting,
    ArtworkSelect,
    ArtDisplay,
    SpyVoting,
    RealSpy,
    SpyGuess,
    SpyGuessResult,
    GameResult,
}

/// Areas inside the table's central board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    SubjectVote,
    SubjectAnnouncement,
    DrawingInput,
    ArtSelect,
    ArtShow,
    ArtWaiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// A data-only description of something the player should now see.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    ShowContainer(Container),
    ShowInterface(Interface),
    /// Hide any interface and show the central board area.
    ShowArea(Area),
    /// Round progress indicator, 1-based.
    Progress(u32),
    RoomEntered {
        room_id: String,
        self_id: PlayerId,
    },
    Roster {
        players: Vec<Player>,
        self_id: PlayerId,
        /// Whether the start button should be enabled for this client.
        can_start: bool,
    },
    AvatarChanged {
        player_id: PlayerId,
        avatar_id: u32,
    },
    TopicOptions(Vec<String>),
    TopicAnnounced {
        topic: String,
        /// `None` for the spy.
        keyword: Option<String>,
        is_spy: bool,
        round: u32,
    },
    StyleCatalog(Vec<StyleInfo>),
    StyleSelected(u32),
    ArtworkOptions(Vec<String>),
    ShowingTurn {
        player_id: PlayerId,
        player_name: String,
        is_mine: bool,
        show_time: Option<u32>,
    },
    ArtworkRevealed {
        player_id: PlayerId,
        player_name: String,
        image: String,
    },
    VoteCandidates(Vec<Player>),
    Countdown(u32),
    VoteTally {
        counts: BTreeMap<PlayerId, u32>,
        voters: BTreeMap<PlayerId, Vec<PlayerId>>,
    },
    SpyRevealed {
        spy_id: PlayerId,
        spy_name: String,
        caught: bool,
        roulette: Vec<RouletteStep>,
    },
    TallyCleared,
    SpyGuessPrompt {
        /// Keyword candidates; only the spy may pick one.
        options: Vec<String>,
        can_guess: bool,
    },
    SpyGuessShown(String),
    KeywordRevealed(String),
    Verdict {
        correct: bool,
    },
    VerdictCleared,
    Outcome {
        win: WinType,
        winners: Vec<PlayerId>,
        spy_id: Option<PlayerId>,
    },
    Gallery(Vec<GalleryEntry>),
    RematchReady(PlayerId),
    Notice(Notice),
}

/// Cosmetic cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    Notify,
    CountdownTick,
    RouletteSpin,
    SpyCaught,
    SpyEscaped,
    GuessCorrect,
    GuessWrong,
    Victory,
    Defeat,
}

/// Renders view updates.
pub trait Presenter: Send {
    fn render(&mut self, update: ViewUpdate);
}

/// Plays cosmetic effects.
pub trait EffectsPlayer: Send {
    fn play(&mut self, effect: Effect);

    /// Master volume in `0.0..=1.0`.
    fn set_volume(&mut self, _volume: f64) {}
}

// ── Implementations ─────────────────────────────────────────────────

/// Presenter that writes each update to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn render(&mut self, update: ViewUpdate) {
        match update {
            ViewUpdate::PhaseChanged { from, to } => info!(?from, ?to, "phase"),
            ViewUpdate::Notice(Notice { level, message }) => match level {
                NoticeLevel::Error | NoticeLevel::Warning => warn!(?level, "{message}"),
                NoticeLevel::Info | NoticeLevel::Success => info!(?level, "{message}"),
            },
            ViewUpdate::ArtworkOptions(images) => info!(count = images.len(), "artwork options"),
            ViewUpdate::ArtworkRevealed {
                player_name, image, ..
            } => info!(player = %player_name, bytes = image.len(), "artwork revealed"),
            ViewUpdate::Gallery(entries) => info!(players = entries.len(), "gallery"),
            ViewUpdate::SpyRevealed {
                spy_name,
                caught,
                roulette,
                ..
            } => info!(spy = %spy_name, caught, roulette_steps = roulette.len(), "spy revealed"),
            other => info!(update = ?other, "view"),
        }
    }
}

/// Effects player that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEffects;

impl EffectsPlayer for NullEffects {
    fn play(&mut self, _effect: Effect) {}
}

/// Presenter and effects player that keeps everything it receives.
///
/// Clones share one log, so a clone can be handed to the machine and the
/// original inspected afterwards.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    updates: Arc<Mutex<Vec<ViewUpdate>>>,
    effects: Arc<Mutex<Vec<Effect>>>,
    volume: Arc<Mutex<Option<f64>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything rendered so far.
    pub fn updates(&self) -> Vec<ViewUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Everything played so far.
    pub fn effects(&self) -> Vec<Effect> {
        self.effects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The last volume set, if any.
    pub fn volume(&self) -> Option<f64> {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain the recorded updates.
    pub fn take_updates(&self) -> Vec<ViewUpdate> {
        std::mem::take(&mut *self.updates.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Presenter for Recorder {
    fn render(&mut self, update: ViewUpdate) {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update);
    }
}

impl EffectsPlayer for Recorder {
    fn play(&mut self, effect: Effect) {
        self.effects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(effect);
    }

    fn set_volume(&mut self, volume: f64) {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner) = Some(volume);
    }
}
