//! Pure match/round progression state machine.
//!
//! Sequencing, winner determination, and the best-of-N tally live here with
//! no I/O; the [`coordinator`](crate::sync::coordinator) drives the timer,
//! the counters, and the network around it.

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

/// High-level phases of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// No match is active.
    Idle,
    /// A round is underway (countdown running or paused within the round).
    RoundActive,
    /// A round has been scored; awaiting the operator's acknowledgment.
    RoundSummary,
    /// The match is over; a new one may be started.
    MatchComplete,
}

/// Outcome of a round or a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Winner {
    /// A single competitor held the strictly-highest score.
    Competitor(String),
    /// Two or more competitors shared the strictly-highest positive score.
    Tie,
    /// Nobody scored (or the round never produced a positive score).
    None,
}

impl Winner {
    /// Parse the wire representation used by `game-over` frames.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "Tie" => Winner::Tie,
            "None" => Winner::None,
            name => Winner::Competitor(name.to_string()),
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Competitor(name) => f.write_str(name),
            Winner::Tie => f.write_str("Tie"),
            Winner::None => f.write_str("None"),
        }
    }
}

/// Immutable record of one completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRecord {
    /// 1-based round number.
    pub round_number: u32,
    /// Score snapshot taken when the round ended.
    pub scores: IndexMap<String, i64>,
    /// Outcome of the round.
    pub winner: Winner,
}

/// Error returned when an operation is not valid in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// `start_game` while a match is already running.
    #[error("a match is already in progress (phase {phase:?})")]
    AlreadyInProgress {
        /// Phase the flow was in.
        phase: MatchPhase,
    },
    /// Best-of-N requires an odd, positive round count.
    #[error("max rounds must be odd and at least 1, got {0}")]
    InvalidRounds(u32),
    /// The requested operation needs a different phase.
    #[error("cannot {action} while in {phase:?}")]
    WrongPhase {
        /// Operation that was attempted.
        action: &'static str,
        /// Phase the flow was in.
        phase: MatchPhase,
    },
    /// `advance_round` after the match has been decided.
    #[error("the match is already decided")]
    MatchDecided,
}

/// Summary handed back when a round is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundClose {
    /// 1-based number of the round that just ended.
    pub round_number: u32,
    /// Outcome of the round.
    pub winner: Winner,
    /// Non-tie round wins per competitor so far.
    pub standings: IndexMap<String, u32>,
    /// True when no further round may be played.
    pub match_decided: bool,
}

/// Best-of-N match state machine: `Idle` → `RoundActive` ⇄ `RoundSummary`
/// → `MatchComplete`.
#[derive(Debug, Clone)]
pub struct MatchFlow {
    phase: MatchPhase,
    current_round: u32,
    max_rounds: u32,
    rounds: Vec<RoundRecord>,
    decided: bool,
}

impl Default for MatchFlow {
    fn default() -> Self {
        Self {
            phase: MatchPhase::Idle,
            current_round: 0,
            max_rounds: 0,
            rounds: Vec::new(),
            decided: false,
        }
    }
}

impl MatchFlow {
    /// Create a flow in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// 1-based number of the round currently active or last recorded.
    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    /// Configured best-of-N round count.
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Records of every completed round, in order.
    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    /// Whether a match is currently running (active round or summary).
    pub fn is_in_progress(&self) -> bool {
        matches!(self.phase, MatchPhase::RoundActive | MatchPhase::RoundSummary)
    }

    /// Round wins required to take the match.
    pub fn wins_needed(&self) -> u32 {
        self.max_rounds.div_ceil(2)
    }

    /// Begin a fresh match. Rejected while one is in progress.
    pub fn begin(&mut self, max_rounds: u32) -> Result<(), FlowError> {
        if self.is_in_progress() {
            return Err(FlowError::AlreadyInProgress { phase: self.phase });
        }
        if max_rounds == 0 || max_rounds % 2 == 0 {
            return Err(FlowError::InvalidRounds(max_rounds));
        }
        self.phase = MatchPhase::RoundActive;
        self.current_round = 1;
        self.max_rounds = max_rounds;
        self.rounds.clear();
        self.decided = false;
        Ok(())
    }

    /// Score the active round from a counter snapshot and move to summary.
    pub fn record_round(&mut self, scores: IndexMap<String, i64>) -> Result<RoundClose, FlowError> {
        if self.phase != MatchPhase::RoundActive {
            return Err(FlowError::WrongPhase {
                action: "record a round",
                phase: self.phase,
            });
        }
        let winner = round_winner(&scores);
        self.rounds.push(RoundRecord {
            round_number: self.current_round,
            scores,
            winner: winner.clone(),
        });
        self.decided = self.leading_winner().is_some() || self.current_round >= self.max_rounds;
        self.phase = MatchPhase::RoundSummary;
        Ok(RoundClose {
            round_number: self.current_round,
            winner,
            standings: self.win_counts(),
            match_decided: self.decided,
        })
    }

    /// Move from an undecided summary into the next round.
    pub fn advance_round(&mut self) -> Result<u32, FlowError> {
        if self.phase != MatchPhase::RoundSummary {
            return Err(FlowError::WrongPhase {
                action: "start the next round",
                phase: self.phase,
            });
        }
        if self.decided {
            return Err(FlowError::MatchDecided);
        }
        self.current_round += 1;
        self.phase = MatchPhase::RoundActive;
        Ok(self.current_round)
    }

    /// Terminate the match, computing the winner when not supplied.
    ///
    /// Valid from summary (normal flow) and from an active round (abrupt
    /// termination by the operator).
    pub fn complete(&mut self, winner: Option<Winner>) -> Result<Winner, FlowError> {
        if !self.is_in_progress() {
            return Err(FlowError::WrongPhase {
                action: "end the match",
                phase: self.phase,
            });
        }
        let winner = winner.unwrap_or_else(|| self.final_winner());
        self.phase = MatchPhase::MatchComplete;
        self.decided = true;
        Ok(winner)
    }

    /// Non-tie round wins per competitor, in first-win order.
    pub fn win_counts(&self) -> IndexMap<String, u32> {
        let mut counts = IndexMap::new();
        for record in &self.rounds {
            if let Winner::Competitor(name) = &record.winner {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Competitor who already reached the required win count, if any.
    pub fn leading_winner(&self) -> Option<String> {
        let needed = self.wins_needed();
        self.win_counts()
            .into_iter()
            .find(|(_, wins)| *wins >= needed)
            .map(|(name, _)| name)
    }

    /// Overall outcome from the round-win tally: most wins takes the match,
    /// equal counts end in a tie, no recorded wins in no winner.
    pub fn final_winner(&self) -> Winner {
        let mut best_wins = 0;
        let mut winner = Winner::None;
        for (name, wins) in self.win_counts() {
            if wins > best_wins {
                best_wins = wins;
                winner = Winner::Competitor(name);
            } else if wins == best_wins {
                winner = Winner::Tie;
            }
        }
        winner
    }

    /// Total points per competitor summed across every recorded round.
    pub fn total_scores(&self) -> IndexMap<String, i64> {
        let mut totals = IndexMap::new();
        for record in &self.rounds {
            for (name, score) in &record.scores {
                *totals.entry(name.clone()).or_insert(0) += score;
            }
        }
        totals
    }
}

/// Score one round: the strictly-highest score wins; a shared positive
/// maximum is a tie; an all-zero (or empty, or negative) board has no winner.
pub fn round_winner(scores: &IndexMap<String, i64>) -> Winner {
    let Some(top) = scores.values().max().copied() else {
        return Winner::None;
    };
    if top <= 0 {
        return Winner::None;
    }
    let mut leaders = scores.iter().filter(|(_, score)| **score == top);
    let first = leaders.next().map(|(name, _)| name.clone());
    match (first, leaders.next()) {
        (Some(_), Some(_)) => Winner::Tie,
        (Some(name), None) => Winner::Competitor(name),
        (None, _) => Winner::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(entries: &[(&str, i64)]) -> IndexMap<String, i64> {
        entries
            .iter()
            .map(|(name, score)| (name.to_string(), *score))
            .collect()
    }

    #[test]
    fn clear_highest_score_wins_the_round() {
        assert_eq!(
            round_winner(&scores(&[("A", 5), ("B", 2)])),
            Winner::Competitor("A".into())
        );
    }

    #[test]
    fn shared_positive_maximum_is_a_tie() {
        assert_eq!(round_winner(&scores(&[("A", 3), ("B", 3)])), Winner::Tie);
    }

    #[test]
    fn scoreless_round_has_no_winner() {
        assert_eq!(round_winner(&scores(&[("A", 0), ("B", 0)])), Winner::None);
        assert_eq!(round_winner(&scores(&[])), Winner::None);
        assert_eq!(round_winner(&scores(&[("A", -2), ("B", -1)])), Winner::None);
    }

    #[test]
    fn begin_rejects_even_or_zero_round_counts() {
        let mut flow = MatchFlow::new();
        assert_eq!(flow.begin(4), Err(FlowError::InvalidRounds(4)));
        assert_eq!(flow.begin(0), Err(FlowError::InvalidRounds(0)));
        assert!(flow.begin(3).is_ok());
    }

    #[test]
    fn begin_while_in_progress_is_rejected_and_state_kept() {
        let mut flow = MatchFlow::new();
        flow.begin(3).unwrap();
        flow.record_round(scores(&[("A", 1), ("B", 0)])).unwrap();

        let err = flow.begin(5).unwrap_err();
        assert!(matches!(err, FlowError::AlreadyInProgress { .. }));
        assert_eq!(flow.current_round(), 1);
        assert_eq!(flow.rounds().len(), 1);
        assert_eq!(flow.max_rounds(), 3);
    }

    #[test]
    fn best_of_five_ends_after_three_straight_wins() {
        let mut flow = MatchFlow::new();
        flow.begin(5).unwrap();
        assert_eq!(flow.wins_needed(), 3);

        for round in 1..=3 {
            let close = flow.record_round(scores(&[("A", 2), ("B", 1)])).unwrap();
            assert_eq!(close.round_number, round);
            assert_eq!(close.winner, Winner::Competitor("A".into()));
            if round < 3 {
                assert!(!close.match_decided);
                assert_eq!(flow.advance_round().unwrap(), round + 1);
            } else {
                assert!(close.match_decided);
            }
        }

        assert_eq!(flow.advance_round(), Err(FlowError::MatchDecided));
        assert_eq!(
            flow.complete(None).unwrap(),
            Winner::Competitor("A".into())
        );
        assert_eq!(flow.phase(), MatchPhase::MatchComplete);
    }

    #[test]
    fn match_is_decided_after_the_last_scheduled_round() {
        let mut flow = MatchFlow::new();
        flow.begin(3).unwrap();
        // A, then B, then a scoreless final round: nobody reaches two wins.
        flow.record_round(scores(&[("A", 1), ("B", 0)])).unwrap();
        flow.advance_round().unwrap();
        flow.record_round(scores(&[("A", 0), ("B", 1)])).unwrap();
        flow.advance_round().unwrap();
        let close = flow.record_round(scores(&[("A", 0), ("B", 0)])).unwrap();
        assert_eq!(close.winner, Winner::None);
        assert!(close.match_decided);
        // One win each: the match itself is a tie.
        assert_eq!(flow.complete(None).unwrap(), Winner::Tie);
    }

    #[test]
    fn abrupt_completion_from_an_active_round() {
        let mut flow = MatchFlow::new();
        flow.begin(3).unwrap();
        flow.record_round(scores(&[("A", 3), ("B", 1)])).unwrap();
        flow.advance_round().unwrap();
        assert_eq!(
            flow.complete(None).unwrap(),
            Winner::Competitor("A".into())
        );
    }

    #[test]
    fn tied_rounds_do_not_count_toward_the_tally() {
        let mut flow = MatchFlow::new();
        flow.begin(3).unwrap();
        flow.record_round(scores(&[("A", 2), ("B", 2)])).unwrap();
        flow.advance_round().unwrap();
        let close = flow.record_round(scores(&[("A", 1), ("B", 0)])).unwrap();
        assert_eq!(close.standings, scores_u32(&[("A", 1)]));
        assert!(!close.match_decided);
    }

    #[test]
    fn totals_accumulate_across_rounds() {
        let mut flow = MatchFlow::new();
        flow.begin(3).unwrap();
        flow.record_round(scores(&[("A", 2), ("B", 1)])).unwrap();
        flow.advance_round().unwrap();
        flow.record_round(scores(&[("A", 1), ("B", 4)])).unwrap();
        assert_eq!(flow.total_scores(), scores(&[("A", 3), ("B", 5)]));
    }

    #[test]
    fn record_round_outside_an_active_round_is_rejected() {
        let mut flow = MatchFlow::new();
        let err = flow.record_round(scores(&[("A", 1)])).unwrap_err();
        assert!(matches!(
            err,
            FlowError::WrongPhase {
                action: "record a round",
                phase: MatchPhase::Idle
            }
        ));
    }

    fn scores_u32(entries: &[(&str, u32)]) -> IndexMap<String, u32> {
        entries
            .iter()
            .map(|(name, wins)| (name.to_string(), *wins))
            .collect()
    }
}
