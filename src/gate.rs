//! One-shot guards against duplicate submission of in-round actions.
//!
//! A guard is consumed optimistically the instant its action is sent and is
//! only re-armed when the phase that owns it is entered again.

use std::collections::HashMap;

use crate::machine::Phase;

/// Guarded actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKey {
    ChooseTopic,
    SelectArt,
    VoteSpy,
    GuessSpyWord,
    RequestRematch,
}

impl ActionKey {
    pub const ALL: [ActionKey; 5] = [
        Self::ChooseTopic,
        Self::SelectArt,
        Self::VoteSpy,
        Self::GuessSpyWord,
        Self::RequestRematch,
    ];

    /// The phase whose entry re-arms this guard.
    pub fn owner(self) -> Phase {
        match self {
            Self::ChooseTopic => Phase::TopicVoting,
            Self::SelectArt => Phase::ArtworkSelection,
            Self::VoteSpy => Phase::SpyVoting,
            Self::GuessSpyWord => Phase::SpyGuess,
            Self::RequestRematch => Phase::ResultSequence,
        }
    }
}

/// What a server `error` does to the guard of the action that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Leave the guard consumed. The player waits for the next phase.
    #[default]
    Keep,
    /// Re-arm the guard so the player can try again.
    Release,
}

/// Per-action one-shot flags for the current phase instance.
#[derive(Debug, Clone, Default)]
pub struct ActionGate {
    consumed: HashMap<ActionKey, bool>,
    policies: HashMap<ActionKey, ErrorPolicy>,
    last_consumed: Option<ActionKey>,
}

impl ActionGate {
    /// A gate with every guard armed and every policy [`ErrorPolicy::Keep`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the error policy of one action.
    #[must_use]
    pub fn with_policy(mut self, key: ActionKey, policy: ErrorPolicy) -> Self {
        self.policies.insert(key, policy);
        self
    }

    pub fn policy(&self, key: ActionKey) -> ErrorPolicy {
        self.policies.get(&key).copied().unwrap_or_default()
    }

    /// Returns `true` exactly once until [`reset`](Self::reset) is called.
    pub fn try_consume(&mut self, key: ActionKey) -> bool {
        let slot = self.consumed.entry(key).or_insert(false);
        if *slot {
            return false;
        }
        *slot = true;
        self.last_consumed = Some(key);
        true
    }

    pub fn is_consumed(&self, key: ActionKey) -> bool {
        self.consumed.get(&key).copied().unwrap_or(false)
    }

    /// Re-arm a guard.
    pub fn reset(&mut self, key: ActionKey) {
        self.consumed.insert(key, false);
        if self.last_consumed == Some(key) {
            self.last_consumed = None;
        }
    }

    /// Re-arm every guard owned by `phase`.
    pub fn enter_phase(&mut self, phase: Phase) {
        for key in ActionKey::ALL {
            if key.owner() == phase {
                self.reset(key);
            }
        }
    }

    /// Apply the error policy of the most recently consumed guard. Returns
    /// the released key, if any.
    pub fn on_server_error(&mut self) -> Option<ActionKey> {
        let key = self.last_consumed?;
        if self.policy(key) == ErrorPolicy::Release {
            self.reset(key);
            Some(key)
        } else {
            None
        }
    }
}
