//! Ordered, cancellable runs of timed stages.
//!
//! A [`SequencePlayer`] spawns one tokio task per run. For each stage the task
//! delivers the stage's effect as a [`Cue`] and then sleeps for the stage's
//! delay, so stage *N* is never cued before stage *N − 1*'s delay has elapsed.
//! The task never touches game state: the owner applies each cue on its own
//! loop and ignores cues whose run is no longer current.
//!
//! ```rust
//! # async fn demo() {
//! use std::time::Duration;
//! use spy_artist_client::sequence::{SequencePlayer, Stage};
//!
//! let (mut player, mut cues) = SequencePlayer::new();
//! player.start(vec![
//!     Stage::fixed("tally", Duration::from_millis(2000)),
//!     Stage::fixed("reveal", Duration::from_millis(3000)),
//! ]);
//!
//! while let Some(cue) = cues.recv().await {
//!     if !player.is_current(cue.run) {
//!         continue;
//!     }
//!     println!("stage {}: {}", cue.index, cue.effect);
//!     if cue.last {
//!         break;
//!     }
//! }
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// How long to wait after a stage's effect before cueing the next stage.
#[derive(Debug, Clone, Copy)]
pub enum Delay<E> {
    Fixed(Duration),
    /// Derived from the stage's own effect payload.
    Computed(fn(&E) -> Duration),
}

impl<E> Delay<E> {
    pub fn resolve(&self, effect: &E) -> Duration {
        match self {
            Self::Fixed(d) => *d,
            Self::Computed(f) => f(effect),
        }
    }
}

/// One step of a run.
#[derive(Debug, Clone)]
pub struct Stage<E> {
    pub effect: E,
    pub delay: Delay<E>,
}

impl<E> Stage<E> {
    pub fn fixed(effect: E, delay: Duration) -> Self {
        Self {
            effect,
            delay: Delay::Fixed(delay),
        }
    }

    pub fn computed(effect: E, delay: fn(&E) -> Duration) -> Self {
        Self {
            effect,
            delay: Delay::Computed(delay),
        }
    }
}

/// A stage effect that is due now.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue<E> {
    /// Run that produced the cue.
    pub run: u64,
    /// Position of the stage in its run.
    pub index: usize,
    pub effect: E,
    /// Whether this is the final stage of the run.
    pub last: bool,
}

/// Executes one run of stages at a time.
#[derive(Debug)]
pub struct SequencePlayer<E> {
    cue_tx: mpsc::UnboundedSender<Cue<E>>,
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl<E: Send + 'static> SequencePlayer<E> {
    /// Create a player and the receiver its cues arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Cue<E>>) {
        let (cue_tx, cue_rx) = mpsc::unbounded_channel();
        let player = Self {
            cue_tx,
            generation: Arc::new(AtomicU64::new(0)),
            task: None,
        };
        (player, cue_rx)
    }

    /// Start a new run, cancelling any run in flight. Returns the run id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, stages: Vec<Stage<E>>) -> u64 {
        self.cancel();
        let run = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let generation = Arc::clone(&self.generation);
        let cue_tx = self.cue_tx.clone();
        let total = stages.len();
        debug!(run, stages = total, "sequence run started");

        self.task = Some(tokio::spawn(async move {
            for (index, stage) in stages.into_iter().enumerate() {
                if generation.load(Ordering::Acquire) != run {
                    return;
                }
                let delay = stage.delay.resolve(&stage.effect);
                let cue = Cue {
                    run,
                    index,
                    effect: stage.effect,
                    last: index + 1 == total,
                };
                if cue_tx.send(cue).is_err() {
                    return;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }));
        run
    }

    /// Stop scheduling further stages of the current run.
    ///
    /// Cues already queued are left in the channel; [`is_current`](Self::is_current)
    /// reports them as stale.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let stale = self.generation.fetch_add(1, Ordering::AcqRel);
            debug!(run = stale, "sequence run cancelled");
        }
    }

    /// Whether `run` is the run in flight.
    pub fn is_current(&self, run: u64) -> bool {
        self.task.is_some() && self.generation.load(Ordering::Acquire) == run
    }

    /// Whether a run has been started and not cancelled.
    ///
    /// Stays `true` after the last cue until the next `start` or `cancel`.
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }
}

impl<E> Drop for SequencePlayer<E> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
