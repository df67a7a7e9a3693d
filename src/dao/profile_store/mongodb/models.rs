use std::time::SystemTime;

use mongodb::bson::{DateTime, Document, doc};
use serde::Deserialize;

use crate::dao::models::{AchievementsEntity, HistoryEntryEntity, MatchResult, ProfileEntity};

/// Profile document as stored in the `profile` collection.
///
/// Counters default to zero so documents written before they existed still load.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoProfileDocument {
    profile_name: String,
    #[serde(default)]
    total_trophies: i64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    wins: i64,
    #[serde(default)]
    win_streak: i64,
    #[serde(default)]
    achievements: AchievementsEntity,
    #[serde(default)]
    history: Vec<MongoHistoryDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoHistoryDocument {
    opponent: String,
    result: MatchResult,
    #[serde(default)]
    played_at: Option<DateTime>,
}

impl MongoProfileDocument {
    pub fn win_streak(&self) -> u32 {
        clamp_counter(self.win_streak)
    }
}

impl From<MongoProfileDocument> for ProfileEntity {
    fn from(value: MongoProfileDocument) -> Self {
        Self {
            name: value.profile_name,
            total_trophies: clamp_counter(value.total_trophies),
            status: value.status,
            country: value.country,
            wins: clamp_counter(value.wins),
            win_streak: clamp_counter(value.win_streak),
            achievements: value.achievements,
            history: value.history.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<MongoHistoryDocument> for HistoryEntryEntity {
    fn from(value: MongoHistoryDocument) -> Self {
        Self {
            opponent: value.opponent,
            result: value.result,
            played_at: value
                .played_at
                .map(DateTime::to_system_time)
                .unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

/// Build the insert document for a brand new profile.
pub fn new_profile_document(profile: &ProfileEntity) -> Document {
    doc! {
        "profileName": &profile.name,
        "totalTrophies": i64::from(profile.total_trophies),
        "status": &profile.status,
        "country": &profile.country,
        "wins": i64::from(profile.wins),
        "winStreak": i64::from(profile.win_streak),
        "achievements": {
            "firstVictory": profile.achievements.first_victory,
            "perfectRound": profile.achievements.perfect_round,
            "lightningReflexes": profile.achievements.lightning_reflexes,
            "quizChampion": profile.achievements.quiz_champion,
            "clutchPerformer": profile.achievements.clutch_performer,
        },
        "history": [],
    }
}

/// Subdocument pushed onto a profile's `history` array.
pub fn history_document(entry: &HistoryEntryEntity) -> Document {
    doc! {
        "opponent": &entry.opponent,
        "result": entry.result.as_str(),
        "playedAt": DateTime::from_system_time(entry.played_at),
    }
}

/// Filter selecting a profile by display name.
pub fn by_name(name: &str) -> Document {
    doc! { "profileName": name }
}

fn clamp_counter(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}
