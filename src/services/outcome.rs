//! Match outcome computation and the per-player settlements derived from it.
//!
//! Everything here is pure: the registry hands over the retired room and the
//! completion report, and the result is queued for persistence.

use std::time::SystemTime;

use crate::dao::models::{Achievement, HistoryEntryEntity, MatchResult};

/// Trophies granted to the winner of a decisive match.
pub const WIN_TROPHIES: i32 = 5;
/// Trophies taken from the loser of a decisive match.
pub const LOSS_TROPHIES: i32 = -3;
/// Lead the eventual loser must have held, strictly exceeded, for a clutch win.
pub const CLUTCH_MARGIN: i64 = 40;
/// Rounds scanned for a clutch comeback.
pub const MATCH_ROUNDS: usize = 5;

/// Flags a client computes about its own performance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideFlags {
    /// Every answer was correct.
    pub perfect_score: bool,
    /// The lightning-reflex round was completed.
    pub fast_reflex: bool,
}

/// One side of a finished match as known when the completion report arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideReport {
    /// Display name of the player.
    pub name: String,
    /// Cumulative score after each round.
    pub scores: Vec<i64>,
    /// Self-reported achievement flags.
    pub flags: SideFlags,
}

impl SideReport {
    /// Build a report for one side.
    pub fn new(name: impl Into<String>, scores: Vec<i64>, flags: SideFlags) -> Self {
        Self {
            name: name.into(),
            scores,
            flags,
        }
    }

    /// Final score; a side that reported nothing scored zero.
    pub fn total(&self) -> i64 {
        self.scores.last().copied().unwrap_or(0)
    }
}

/// Result of a finished match.
///
/// On a draw `winner_name` is the reporting side and `loser_name` its opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Player with the higher final score.
    pub winner_name: String,
    /// Player with the lower final score.
    pub loser_name: String,
    /// Both final scores were equal.
    pub is_draw: bool,
    /// Winner who came back from a deficit larger than [`CLUTCH_MARGIN`].
    pub clutch_performer: Option<String>,
    /// Flags reported for the winning side.
    pub winner_flags: SideFlags,
    /// Flags reported for the losing side.
    pub loser_flags: SideFlags,
}

/// Changes to apply to one player's profile after a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettlement {
    /// Profile to update.
    pub name: String,
    /// Signed trophy change.
    pub trophy_delta: i32,
    /// Whether the win counter and streak advance.
    pub record_win: bool,
    /// Achievements to unlock; already unlocked ones are ignored.
    pub achievements: Vec<Achievement>,
    /// Entry appended to the match history.
    pub history: HistoryEntryEntity,
}

/// Decide the match from the reporter's view of both sides.
pub fn decide(own: SideReport, opponent: SideReport) -> MatchOutcome {
    if own.total() == opponent.total() {
        return MatchOutcome {
            winner_name: own.name,
            loser_name: opponent.name,
            is_draw: true,
            clutch_performer: None,
            winner_flags: own.flags,
            loser_flags: opponent.flags,
        };
    }

    let (winner, loser) = if own.total() > opponent.total() {
        (own, opponent)
    } else {
        (opponent, own)
    };
    let clutch_performer = comeback_round(&winner.scores, &loser.scores).map(|_| winner.name.clone());

    MatchOutcome {
        winner_name: winner.name,
        loser_name: loser.name,
        is_draw: false,
        clutch_performer,
        winner_flags: winner.flags,
        loser_flags: loser.flags,
    }
}

/// First round within the match length where the loser led by more than [`CLUTCH_MARGIN`].
fn comeback_round(winner: &[i64], loser: &[i64]) -> Option<usize> {
    winner
        .iter()
        .zip(loser)
        .take(MATCH_ROUNDS)
        .position(|(winner_score, loser_score)| {
            i128::from(*loser_score) - i128::from(*winner_score) > i128::from(CLUTCH_MARGIN)
        })
}

/// Split an outcome into the winner-side and loser-side settlements.
pub fn settlements(outcome: &MatchOutcome, played_at: SystemTime) -> [PlayerSettlement; 2] {
    let (winner_result, loser_result, winner_delta, loser_delta) = if outcome.is_draw {
        (MatchResult::Draw, MatchResult::Draw, 0, 0)
    } else {
        (MatchResult::Won, MatchResult::Lost, WIN_TROPHIES, LOSS_TROPHIES)
    };

    let mut winner_achievements = flag_achievements(outcome.winner_flags);
    if !outcome.is_draw {
        winner_achievements.push(Achievement::FirstVictory);
        if outcome.clutch_performer.as_deref() == Some(outcome.winner_name.as_str()) {
            winner_achievements.push(Achievement::ClutchPerformer);
        }
    }

    [
        PlayerSettlement {
            name: outcome.winner_name.clone(),
            trophy_delta: winner_delta,
            record_win: !outcome.is_draw,
            achievements: winner_achievements,
            history: HistoryEntryEntity {
                opponent: outcome.loser_name.clone(),
                result: winner_result,
                played_at,
            },
        },
        PlayerSettlement {
            name: outcome.loser_name.clone(),
            trophy_delta: loser_delta,
            record_win: false,
            achievements: flag_achievements(outcome.loser_flags),
            history: HistoryEntryEntity {
                opponent: outcome.winner_name.clone(),
                result: loser_result,
                played_at,
            },
        },
    ]
}

fn flag_achievements(flags: SideFlags) -> Vec<Achievement> {
    let mut achievements = Vec::new();
    if flags.perfect_score {
        achievements.push(Achievement::PerfectRound);
    }
    if flags.fast_reflex {
        achievements.push(Achievement::LightningReflexes);
    }
    achievements
}
