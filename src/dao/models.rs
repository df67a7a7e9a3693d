use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Number of consecutive wins that unlocks [`Achievement::QuizChampion`].
pub const QUIZ_CHAMPION_STREAK: u32 = 10;

/// Player profile stored in persistence and shared across layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntity {
    /// Unique display name, also used as the duel identity.
    pub name: String,
    /// Ranking score; never negative.
    pub total_trophies: u32,
    /// Free-form status line.
    pub status: String,
    /// Country shown on the leaderboard.
    pub country: String,
    /// Number of decisive wins.
    pub wins: u32,
    /// Current run of consecutive wins.
    pub win_streak: u32,
    pub achievements: AchievementsEntity,
    /// Match history, oldest first.
    pub history: Vec<HistoryEntryEntity>,
}

impl ProfileEntity {
    /// Fresh profile with zeroed counters.
    pub fn new(name: impl Into<String>, status: String, country: String) -> Self {
        Self {
            name: name.into(),
            total_trophies: 0,
            status,
            country,
            wins: 0,
            win_streak: 0,
            achievements: AchievementsEntity::default(),
            history: Vec::new(),
        }
    }

    /// Apply a signed trophy delta, flooring the total at zero.
    pub fn apply_trophy_delta(&mut self, delta: i32) {
        let next = i64::from(self.total_trophies) + i64::from(delta);
        self.total_trophies = next.clamp(0, i64::from(u32::MAX)) as u32;
    }

    /// Record a history entry and return the updated win streak.
    pub fn push_history(&mut self, entry: HistoryEntryEntity) -> u32 {
        self.win_streak = match entry.result {
            MatchResult::Won => self.win_streak.saturating_add(1),
            MatchResult::Lost | MatchResult::Draw => 0,
        };
        self.history.push(entry);
        self.win_streak
    }
}

/// Unlock flags for every achievement a profile can earn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementsEntity {
    #[serde(default)]
    pub first_victory: bool,
    #[serde(default)]
    pub perfect_round: bool,
    #[serde(default)]
    pub lightning_reflexes: bool,
    #[serde(default)]
    pub quiz_champion: bool,
    #[serde(default)]
    pub clutch_performer: bool,
}

impl AchievementsEntity {
    /// Mark a single achievement as unlocked.
    pub fn unlock(&mut self, achievement: Achievement) {
        match achievement {
            Achievement::FirstVictory => self.first_victory = true,
            Achievement::PerfectRound => self.perfect_round = true,
            Achievement::LightningReflexes => self.lightning_reflexes = true,
            Achievement::QuizChampion => self.quiz_champion = true,
            Achievement::ClutchPerformer => self.clutch_performer = true,
        }
    }

    /// Flags in the display order used by clients.
    pub fn as_flags(&self) -> [bool; 5] {
        [
            self.first_victory,
            self.perfect_round,
            self.lightning_reflexes,
            self.quiz_champion,
            self.clutch_performer,
        ]
    }
}

/// Achievement identifiers as stored in the `achievements` sub-document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Achievement {
    /// Win a first decisive match.
    FirstVictory,
    /// Client reported a perfect score.
    PerfectRound,
    /// Client reported a fast correct answer.
    LightningReflexes,
    /// Win [`QUIZ_CHAMPION_STREAK`] matches in a row.
    QuizChampion,
    /// Win after trailing by a large margin in some round.
    ClutchPerformer,
}

impl Achievement {
    /// Field name inside the stored achievements document.
    pub fn field_name(self) -> &'static str {
        match self {
            Achievement::FirstVictory => "firstVictory",
            Achievement::PerfectRound => "perfectRound",
            Achievement::LightningReflexes => "lightningReflexes",
            Achievement::QuizChampion => "quizChampion",
            Achievement::ClutchPerformer => "clutchPerformer",
        }
    }
}

/// Result of a finished match from one side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Won,
    Lost,
    Draw,
}

impl MatchResult {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchResult::Won => "won",
            MatchResult::Lost => "lost",
            MatchResult::Draw => "draw",
        }
    }
}

/// One line of a player's match history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntryEntity {
    pub opponent: String,
    pub result: MatchResult,
    pub played_at: SystemTime,
}
