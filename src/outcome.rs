//! Winner classification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::{Player, PlayerId, SpyVoteResultPayload};

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WinType {
    /// Spy caught and the keyword guess missed: the citizens win.
    CommonVictory,
    /// Spy caught but guessed the keyword.
    SpyComeback,
    /// Spy undetected and guessed the keyword.
    SpyBigWin,
    /// Spy undetected, keyword guess missed.
    SpySmallWin,
}

impl WinType {
    /// Classify a round from whether the group caught the spy and whether
    /// the spy guessed the keyword.
    pub fn classify(group_caught_spy: bool, spy_guessed_correctly: bool) -> Self {
        match (group_caught_spy, spy_guessed_correctly) {
            (true, false) => Self::CommonVictory,
            (true, true) => Self::SpyComeback,
            (false, true) => Self::SpyBigWin,
            (false, false) => Self::SpySmallWin,
        }
    }

    /// Whether the citizens share the win.
    pub fn citizens_win(self) -> bool {
        self == Self::CommonVictory
    }

    /// Whether the group caught the spy in this outcome.
    pub fn spy_was_caught(self) -> bool {
        matches!(self, Self::CommonVictory | Self::SpyComeback)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CommonVictory => "Common victory",
            Self::SpyComeback => "Spy comeback",
            Self::SpyBigWin => "Spy big win",
            Self::SpySmallWin => "Spy small win",
        }
    }
}

/// The player with strictly the most votes, or `None` on a tie or no votes.
pub fn plurality(vote_counts: &BTreeMap<PlayerId, u32>) -> Option<&PlayerId> {
    let max = vote_counts.values().copied().max().filter(|m| *m > 0)?;
    let mut leaders = vote_counts.iter().filter(|(_, n)| **n == max);
    let (leader, _) = leaders.next()?;
    if leaders.next().is_some() {
        return None;
    }
    Some(leader)
}

/// Whether the group's vote landed on the spy.
///
/// Prefers the server's verdict; otherwise the spy is caught when they are
/// the unique plurality target of the tally.
pub fn group_caught_spy(result: &SpyVoteResultPayload) -> bool {
    if let Some(verdict) = result.guess_spy_correct {
        return verdict;
    }
    plurality(&result.vote_counts).is_some_and(|leader| *leader == result.spy_is)
}

/// Ids of the players who share in an outcome.
pub fn winners(win: WinType, roster: &[Player], spy_id: &str) -> Vec<PlayerId> {
    if win.citizens_win() {
        roster
            .iter()
            .filter(|p| p.id != spy_id)
            .map(|p| p.id.clone())
            .collect()
    } else {
        vec![spy_id.to_string()]
    }
}
