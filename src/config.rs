//! Tunable game-flow settings.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use spy_artist_client::config::{GameConfig, RevealTimings};
//! use spy_artist_client::gate::{ActionKey, ErrorPolicy};
//!
//! let config = GameConfig::default()
//!     .with_vote_countdown(Duration::from_secs(60))
//!     .with_error_policy(ActionKey::GuessSpyWord, ErrorPolicy::Release)
//!     .with_timings(RevealTimings::default().scaled(0.5));
//! assert_eq!(config.timings.show_tally, Duration::from_millis(1000));
//! ```

use std::time::Duration;

use crate::gate::{ActionGate, ActionKey, ErrorPolicy};

const fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Delays of the reveal and result pipelines, and the roulette cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealTimings {
    // ── spy reveal ──
    pub show_tally: Duration,
    /// Minimum time spent on the spy reveal stage.
    pub reveal_spy: Duration,
    pub hold_reveal: Duration,
    pub clear_tally: Duration,

    // ── roulette ──
    /// Time the roulette keeps cycling before it heads for the spy.
    pub roulette: Duration,
    pub roulette_first_step: Duration,
    /// How much each step is shorter than the previous one.
    pub roulette_step_decrement: Duration,
    pub roulette_min_step: Duration,

    // ── result ──
    pub show_spy_guess: Duration,
    pub reveal_keyword: Duration,
    pub verdict: Duration,
    pub clear_verdict: Duration,
    pub show_outcome: Duration,
}

impl Default for RevealTimings {
    fn default() -> Self {
        Self {
            show_tally: ms(2000),
            reveal_spy: ms(3000),
            hold_reveal: ms(9000),
            clear_tally: ms(2000),
            roulette: ms(5000),
            roulette_first_step: ms(500),
            roulette_step_decrement: ms(60),
            roulette_min_step: ms(120),
            show_spy_guess: ms(3000),
            reveal_keyword: ms(3000),
            verdict: ms(4000),
            clear_verdict: ms(2000),
            show_outcome: ms(5000),
        }
    }
}

impl RevealTimings {
    /// All delays zero. Stages still run strictly in order.
    pub fn instant() -> Self {
        Self {
            show_tally: Duration::ZERO,
            reveal_spy: Duration::ZERO,
            hold_reveal: Duration::ZERO,
            clear_tally: Duration::ZERO,
            roulette: Duration::ZERO,
            roulette_first_step: Duration::ZERO,
            roulette_step_decrement: Duration::ZERO,
            roulette_min_step: Duration::ZERO,
            show_spy_guess: Duration::ZERO,
            reveal_keyword: Duration::ZERO,
            verdict: Duration::ZERO,
            clear_verdict: Duration::ZERO,
            show_outcome: Duration::ZERO,
        }
    }

    /// Multiply every delay by `factor`. Results saturate at [`Duration::MAX`].
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let factor = if factor.is_finite() && factor > 0.0 {
            factor
        } else {
            0.0
        };
        let f = |d: Duration| {
            Duration::try_from_secs_f64(d.as_secs_f64() * factor).unwrap_or(Duration::MAX)
        };
        Self {
            show_tally: f(self.show_tally),
            reveal_spy: f(self.reveal_spy),
            hold_reveal: f(self.hold_reveal),
            clear_tally: f(self.clear_tally),
            roulette: f(self.roulette),
            roulette_first_step: f(self.roulette_first_step),
            roulette_step_decrement: f(self.roulette_step_decrement),
            roulette_min_step: f(self.roulette_min_step),
            show_spy_guess: f(self.show_spy_guess),
            reveal_keyword: f(self.reveal_keyword),
            verdict: f(self.verdict),
            clear_verdict: f(self.clear_verdict),
            show_outcome: f(self.show_outcome),
        }
    }

    #[must_use]
    pub fn with_roulette(mut self, duration: Duration) -> Self {
        self.roulette = duration;
        self
    }

    #[must_use]
    pub fn with_hold_reveal(mut self, duration: Duration) -> Self {
        self.hold_reveal = duration;
        self
    }
}

/// Settings for a [`PhaseMachine`](crate::machine::PhaseMachine).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub timings: RevealTimings,
    /// Length of the optional spy-vote countdown. `None` disables it.
    pub vote_countdown: Option<Duration>,
    /// Seconds left at which the countdown starts ticking audibly.
    pub countdown_warning: u32,
    pub error_policies: Vec<(ActionKey, ErrorPolicy)>,
    pub max_players: usize,
    /// Players needed before the host may start a round.
    pub min_players: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            timings: RevealTimings::default(),
            vote_countdown: None,
            countdown_warning: 10,
            error_policies: Vec::new(),
            max_players: 8,
            min_players: 3,
        }
    }
}

impl GameConfig {
    #[must_use]
    pub fn with_timings(mut self, timings: RevealTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Enable the client-side spy-vote countdown.
    #[must_use]
    pub fn with_vote_countdown(mut self, duration: Duration) -> Self {
        self.vote_countdown = Some(duration);
        self
    }

    #[must_use]
    pub fn with_error_policy(mut self, key: ActionKey, policy: ErrorPolicy) -> Self {
        self.error_policies.retain(|(k, _)| *k != key);
        self.error_policies.push((key, policy));
        self
    }

    #[must_use]
    pub fn with_min_players(mut self, min: usize) -> Self {
        self.min_players = min;
        self
    }

    #[must_use]
    pub fn with_max_players(mut self, max: usize) -> Self {
        self.max_players = max;
        self
    }

    /// A fresh gate carrying the configured policies.
    pub fn build_gate(&self) -> ActionGate {
        self.error_policies
            .iter()
            .fold(ActionGate::new(), |gate, (key, policy)| gate.with_policy(*key, *policy))
    }
}
