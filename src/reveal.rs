//! Stage lists for the two narrative pipelines.
//!
//! * Spy reveal: tally → spy (roulette plays during the hold) → hold → clear → spy guess.
//! * Result: spy's guess → keyword → verdict → clear → outcome → gallery.
//!
//! Builders only produce data. The [`PhaseMachine`](crate::machine::PhaseMachine)
//! applies each stage when its [`Cue`](crate::sequence::Cue) arrives.

use std::time::Duration;

use crate::config::RevealTimings;
use crate::outcome::{self, WinType};
use crate::protocol::{GalleryEntry, Player, PlayerId, SpyVoteResultPayload};
use crate::sequence::Stage;

/// Upper bound on roulette steps, whatever the timings.
const MAX_ROULETTE_STEPS: usize = 256;

/// One highlight of the spy roulette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouletteStep {
    pub player_id: PlayerId,
    /// How long the highlight stays on this player.
    pub dwell: Duration,
}

/// Highlight schedule that cycles through `seats` with shrinking dwell times
/// and, once the configured roulette time has passed, stops on the spy.
///
/// When the spy is not seated the schedule simply ends once the time is up.
pub fn roulette_schedule(seats: &[PlayerId], spy_id: &str, t: &RevealTimings) -> Vec<RouletteStep> {
    let spy_seated = seats.iter().any(|id| id == spy_id);
    let mut steps = Vec::new();
    let mut dwell = t.roulette_first_step;
    let mut elapsed = Duration::ZERO;

    for player_id in seats.iter().cycle().take(MAX_ROULETTE_STEPS) {
        steps.push(RouletteStep {
            player_id: player_id.clone(),
            dwell,
        });
        elapsed = elapsed.saturating_add(dwell);
        let time_up = elapsed >= t.roulette || dwell.is_zero();
        if time_up && (!spy_seated || player_id == spy_id) {
            break;
        }
        dwell = dwell
            .saturating_sub(t.roulette_step_decrement)
            .max(t.roulette_min_step);
    }
    steps
}

/// Total time the roulette takes.
pub fn roulette_duration(steps: &[RouletteStep]) -> Duration {
    steps
        .iter()
        .fold(Duration::ZERO, |total, s| total.saturating_add(s.dwell))
}

// ── Spy reveal ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RevealStage {
    ShowTally,
    RevealSpy {
        spy_id: PlayerId,
        caught: bool,
        /// Played by the presenter while the following hold runs.
        roulette: Vec<RouletteStep>,
    },
    HoldReveal,
    ClearTally,
    EnterSpyGuess,
}

/// The spy reveal pipeline for one `voting_spy_result`.
pub fn spy_reveal_stages(
    result: &SpyVoteResultPayload,
    seats: &[PlayerId],
    t: &RevealTimings,
) -> Vec<Stage<RevealStage>> {
    let caught = outcome::group_caught_spy(result);
    let roulette = roulette_schedule(seats, &result.spy_is, t);
    vec![
        Stage::fixed(RevealStage::ShowTally, t.show_tally),
        Stage::fixed(
            RevealStage::RevealSpy {
                spy_id: result.spy_is.clone(),
                caught,
                roulette,
            },
            t.reveal_spy,
        ),
        Stage::fixed(RevealStage::HoldReveal, t.hold_reveal),
        Stage::fixed(RevealStage::ClearTally, t.clear_tally),
        Stage::fixed(RevealStage::EnterSpyGuess, Duration::ZERO),
    ]
}

// ── Result ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ResultStage {
    ShowSpyGuess(String),
    RevealKeyword(String),
    Verdict {
        correct: bool,
    },
    ClearVerdict,
    ShowOutcome {
        win: WinType,
        winners: Vec<PlayerId>,
        spy_id: Option<PlayerId>,
    },
    ShowGallery(Vec<GalleryEntry>),
}

/// Inputs of the result pipeline.
#[derive(Debug, Clone)]
pub struct RoundResult<'a> {
    pub spy_guess: &'a str,
    pub keyword: &'a str,
    pub guessed_correctly: bool,
    pub caught: bool,
    /// Unknown when the client resumed after the vote result.
    pub spy_id: Option<&'a str>,
    pub roster: &'a [Player],
    pub gallery: &'a [GalleryEntry],
}

/// The result pipeline for one `game_ended`.
pub fn result_stages(r: &RoundResult<'_>, t: &RevealTimings) -> Vec<Stage<ResultStage>> {
    let win = WinType::classify(r.caught, r.guessed_correctly);
    vec![
        Stage::fixed(ResultStage::ShowSpyGuess(r.spy_guess.to_string()), t.show_spy_guess),
        Stage::fixed(ResultStage::RevealKeyword(r.keyword.to_string()), t.reveal_keyword),
        Stage::fixed(
            ResultStage::Verdict {
                correct: r.guessed_correctly,
            },
            t.verdict,
        ),
        Stage::fixed(ResultStage::ClearVerdict, t.clear_verdict),
        Stage::fixed(
            ResultStage::ShowOutcome {
                win,
                winners: r
                    .spy_id
                    .map(|spy| outcome::winners(win, r.roster, spy))
                    .unwrap_or_default(),
                spy_id: r.spy_id.map(str::to_string),
            },
            t.show_outcome,
        ),
        Stage::fixed(ResultStage::ShowGallery(r.gallery.to_vec()), Duration::ZERO),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ids(names: &[&str]) -> Vec<PlayerId> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn roulette_slows_down_and_lands_on_spy() {
        let t = RevealTimings::default();
        let seats = ids(&["P1", "P2", "P3", "P4"]);
        let steps = roulette_schedule(&seats, "P3", &t);

        assert_eq!(steps[0].dwell, ms(500));
        assert_eq!(steps[1].dwell, ms(440));
        assert!(steps.windows(2).all(|w| w[1].dwell <= w[0].dwell));
        assert!(steps.iter().all(|s| s.dwell >= ms(120)));
        assert_eq!(steps.last().unwrap().player_id, "P3");

        let total = roulette_duration(&steps);
        assert!(total >= ms(5000));
        let before_last = total - steps.last().unwrap().dwell;
        // Never overshoots by more than one lap of the table.
        assert!(before_last < ms(5000) + ms(120) * 4);
    }

    #[test]
    fn roulette_visits_seats_in_order() {
        let t = RevealTimings::default();
        let seats = ids(&["A", "B", "C"]);
        let steps = roulette_schedule(&seats, "A", &t);
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.player_id, seats[i % 3]);
        }
    }

    #[test]
    fn roulette_handles_degenerate_inputs() {
        let t = RevealTimings::default();
        assert!(roulette_schedule(&[], "P1", &t).is_empty());

        let steps = roulette_schedule(&ids(&["P1", "P2"]), "ghost", &t);
        assert!(roulette_duration(&steps) >= ms(5000));

        let steps = roulette_schedule(&ids(&["P1", "P2"]), "P2", &RevealTimings::instant());
        assert_eq!(steps.len(), 2);
    }

    fn tally_result() -> SpyVoteResultPayload {
        SpyVoteResultPayload {
            most_voted_player: Some("P1".into()),
            spy_is: "P1".into(),
            guess_spy_correct: None,
            vote_counts: BTreeMap::from([("P1".into(), 2), ("P2".into(), 0), ("P3".into(), 1)]),
            vote_results: BTreeMap::new(),
            spy_options: ids(&["cat", "dog"]),
        }
    }

    #[test]
    fn reveal_pipeline_order_and_delays() {
        let t = RevealTimings::default();
        let stages = spy_reveal_stages(&tally_result(), &ids(&["P1", "P2", "P3"]), &t);

        assert_eq!(stages.len(), 5);
        assert_eq!(stages[0].effect, RevealStage::ShowTally);
        assert_eq!(stages[0].delay.resolve(&stages[0].effect), ms(2000));

        match &stages[1].effect {
            RevealStage::RevealSpy { spy_id, caught, roulette, .. } => {
                assert_eq!(spy_id, "P1");
                assert!(*caught);
                assert_eq!(roulette.last().unwrap().player_id, "P1");
            }
            other => panic!("expected RevealSpy, got {other:?}"),
        }
        assert_eq!(stages[1].delay.resolve(&stages[1].effect), ms(3000));

        assert_eq!(stages[2].delay.resolve(&stages[2].effect), ms(9000));
        assert_eq!(stages[3].delay.resolve(&stages[3].effect), ms(2000));
        assert_eq!(stages[4].effect, RevealStage::EnterSpyGuess);
    }

    #[test]
    fn roulette_saturates_with_huge_timings() {
        let t = RevealTimings::default().scaled(1e30);
        let steps = roulette_schedule(&ids(&["P1", "P2", "P3"]), "P3", &t);
        assert_eq!(steps.last().unwrap().player_id, "P3");
        assert_eq!(roulette_duration(&steps), Duration::MAX);
    }

    #[test]
    fn roulette_does_not_stretch_the_pipeline() {
        let seats = ids(&["P1", "P2", "P3", "P4"]);
        let t = RevealTimings::default();
        let stages = spy_reveal_stages(&tally_result(), &seats, &t);
        let delays: Vec<_> = stages.iter().map(|s| s.delay.resolve(&s.effect)).collect();
        assert_eq!(delays, vec![ms(2000), ms(3000), ms(9000), ms(2000), ms(0)]);
        assert_eq!(delays.iter().sum::<Duration>(), ms(16000));

        // A roulette longer than the reveal stage still fits inside the hold.
        let RevealStage::RevealSpy { roulette, .. } = &stages[1].effect else {
            panic!("expected RevealSpy");
        };
        assert!(roulette_duration(roulette) > delays[1]);
        assert!(roulette_duration(roulette) < delays[1] + delays[2]);
    }

    #[test]
    fn result_pipeline_classifies_and_ends_in_gallery() {
        let roster = vec![Player::new("P1", "a"), Player::new("P2", "b"), Player::new("P3", "c")];
        let r = RoundResult {
            spy_guess: "dog",
            keyword: "cat",
            guessed_correctly: false,
            caught: true,
            spy_id: Some("P1"),
            roster: &roster,
            gallery: &[],
        };
        let stages = result_stages(&r, &RevealTimings::default());
        let delays: Vec<_> = stages.iter().map(|s| s.delay.resolve(&s.effect)).collect();
        assert_eq!(delays, vec![ms(3000), ms(3000), ms(4000), ms(2000), ms(5000), ms(0)]);
        assert_eq!(
            stages[4].effect,
            ResultStage::ShowOutcome {
                win: WinType::CommonVictory,
                winners: ids(&["P2", "P3"]),
                spy_id: Some("P1".into()),
            }
        );
        assert!(matches!(stages[5].effect, ResultStage::ShowGallery(_)));
    }
}
