//! The composed client application.
//!
//! [`GameApp`] owns the [`EventChannel`] and the [`PhaseMachine`] and runs the
//! single cooperative loop that feeds the machine. Server events, stage cues
//! and user intents are all applied on this one task, so the machine has a
//! single writer.
//!
//! ```rust,ignore
//! let (mut app, intents) = GameApp::new(
//!     EventChannel::new(WebSocketConnector::new(url), ClientConfig::default()),
//!     GameConfig::default(),
//!     Box::new(LogPresenter),
//!     Box::new(NullEffects),
//!     Box::new(MemoryPreferences::new()),
//! );
//! app.connect().await?;
//! intents.send(Intent::CreateRoom { player_name: "Alice".into() })?;
//! app.run().await;
//! ```

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channel::{EventChannel, EventHandler};
use crate::config::GameConfig;
use crate::error::{ClientError, Result};
use crate::event::ClientEvent;
use crate::machine::{CueReceivers, Intent, PhaseMachine};
use crate::prefs::Preferences;
use crate::presentation::{EffectsPlayer, Notice, Presenter};
use crate::protocol::{ClientMessage, EventKind};
use crate::reveal::{ResultStage, RevealStage};
use crate::sequence::Cue;
use crate::transport::Connector;

/// Capacity of the intent queue handed to the UI.
const INTENT_QUEUE: usize = 64;

/// One unit of work for the loop.
enum Step {
    Event(ClientEvent),
    Reveal(Cue<RevealStage>),
    Result(Cue<ResultStage>),
    Countdown(Cue<u32>),
    Intent(Intent),
    /// A source closed; nothing to apply.
    Idle,
    /// The event stream ended and every intent sender is gone.
    Stop,
}

/// Event channel and phase machine wired together.
pub struct GameApp<C: Connector> {
    channel: EventChannel<C>,
    machine: PhaseMachine,
    cues: CueReceivers,
    intents: mpsc::Receiver<Intent>,
    intents_open: bool,
    stream_open: bool,
}

impl<C: Connector> std::fmt::Debug for GameApp<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameApp")
            .field("channel", &self.channel)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> GameApp<C> {
    /// Build the app. The returned sender is how the UI submits intents.
    pub fn new(
        channel: EventChannel<C>,
        config: GameConfig,
        presenter: Box<dyn Presenter>,
        effects: Box<dyn EffectsPlayer>,
        prefs: Box<dyn Preferences>,
    ) -> (Self, mpsc::Sender<Intent>) {
        let (machine, cues) = PhaseMachine::new(config, presenter, effects, prefs);
        let (intent_tx, intents) = mpsc::channel(INTENT_QUEUE);
        let app = Self {
            channel,
            machine,
            cues,
            intents,
            intents_open: true,
            stream_open: true,
        };
        (app, intent_tx)
    }

    pub fn machine(&self) -> &PhaseMachine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut PhaseMachine {
        &mut self.machine
    }

    pub fn channel(&self) -> &EventChannel<C> {
        &self.channel
    }

    /// Register a hook that runs before the machine sees `kind`.
    pub fn on(&mut self, kind: EventKind, handler: EventHandler) -> Option<EventHandler> {
        self.channel.on(kind, handler)
    }

    /// Open the connection.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when dialing fails.
    pub async fn connect(&mut self) -> Result<()> {
        self.channel.connect().await?;
        self.stream_open = true;
        Ok(())
    }

    /// Reconnect and ask for the saved seat back.
    ///
    /// # Errors
    ///
    /// Returns the connector's error, or [`ClientError::Validation`] when no
    /// session was saved.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.connect().await?;
        if let Some(msg) = self.machine.try_intent(Intent::Rejoin)? {
            self.channel.send(msg)?;
        }
        Ok(())
    }

    /// Run until the event stream ends and the intent sender is dropped.
    ///
    /// A dropped connection does not stop the loop on its own: the player is
    /// told, and intents keep being validated locally while the sender lives.
    pub async fn run(&mut self) {
        info!("game loop started");
        loop {
            match self.next_step().await {
                Step::Stop => break,
                step => self.apply(step),
            }
        }
        info!("game loop stopped");
    }

    /// Wait for and apply one unit of work. Returns `false` once there is
    /// nothing left to wait for.
    pub async fn step(&mut self) -> bool {
        match self.next_step().await {
            Step::Stop => false,
            step => {
                self.apply(step);
                true
            }
        }
    }

    async fn next_step(&mut self) -> Step {
        if !self.stream_open && !self.intents_open {
            return Step::Stop;
        }
        let channel = &mut self.channel;
        let cues = &mut self.cues;
        let intents = &mut self.intents;
        let (stream_open, intents_open) = (self.stream_open, self.intents_open);

        tokio::select! {
            event = channel.next_event(), if stream_open => match event {
                Some(event) => Step::Event(event),
                None => {
                    debug!("event stream ended");
                    self.stream_open = false;
                    Step::Idle
                }
            },
            Some(cue) = cues.reveal.recv() => Step::Reveal(cue),
            Some(cue) = cues.result.recv() => Step::Result(cue),
            Some(cue) = cues.countdown.recv() => Step::Countdown(cue),
            intent = intents.recv(), if intents_open => match intent {
                Some(intent) => Step::Intent(intent),
                None => {
                    debug!("intent sender dropped");
                    self.intents_open = false;
                    Step::Idle
                }
            },
            else => Step::Stop,
        }
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Event(ClientEvent::Connected) => debug!("transport attached"),
            Step::Event(ClientEvent::Server(msg)) => {
                self.channel.dispatch(&msg);
                let follow_up = self.machine.handle(msg);
                self.send_all(follow_up);
            }
            Step::Event(ClientEvent::Disconnected { reason }) => {
                warn!(?reason, "disconnected from game server");
                self.machine.on_disconnected(reason.as_deref());
            }
            Step::Reveal(cue) => self.machine.on_reveal_cue(cue),
            Step::Result(cue) => self.machine.on_result_cue(cue),
            Step::Countdown(cue) => {
                if let Some(msg) = self.machine.on_countdown_cue(cue) {
                    self.send_all(vec![msg]);
                }
            }
            Step::Intent(intent) => {
                if let Some(msg) = self.machine.intent(intent) {
                    self.send_all(vec![msg]);
                }
            }
            Step::Idle | Step::Stop => {}
        }
    }

    fn send_all(&mut self, messages: Vec<ClientMessage>) {
        for msg in messages {
            match self.channel.send(msg) {
                Ok(()) => {}
                Err(ClientError::NotConnected) => {
                    self.machine
                        .notify(Notice::warning("not connected, action not sent"));
                    return;
                }
                Err(e) => {
                    warn!("send failed: {e}");
                    self.machine.notify(Notice::error(e.to_string()));
                    return;
                }
            }
        }
    }
}
