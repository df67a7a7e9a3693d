//! DTO definitions used by the profile REST API and documentation layer.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{HistoryEntryEntity, MatchResult, ProfileEntity},
    dto::{
        format_system_time,
        validation::{validate_display_name, validate_profile_text},
    },
};

/// Query string carrying a profile name (`profileName`, or `profile-name` as sent by older clients).
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileQuery {
    #[serde(rename = "profileName", alias = "profile-name")]
    pub profile_name: String,
}

impl Validate for ProfileQuery {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_display_name(&self.profile_name) {
            errors.add("profileName", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to register a new profile.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    pub profile_name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Payload used to change the editable fields of a profile.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub profile_name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

fn validate_profile_fields(
    name: &str,
    status: Option<&str>,
    country: Option<&str>,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if let Err(e) = validate_display_name(name) {
        errors.add("profileName", e);
    }
    if let Some(Err(e)) = status.map(validate_profile_text) {
        errors.add("status", e);
    }
    if let Some(Err(e)) = country.map(validate_profile_text) {
        errors.add("country", e);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

impl Validate for CreateProfileRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_profile_fields(
            &self.profile_name,
            self.status.as_deref(),
            self.country.as_deref(),
        )
    }
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_profile_fields(
            &self.profile_name,
            self.status.as_deref(),
            self.country.as_deref(),
        )
    }
}

/// Whether a profile name is taken, with the public profile when it is.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckProfileResponse {
    /// "taken" or "notTaken".
    pub message: String,
    pub profile_name: Option<String>,
    pub total_trophies: Option<u32>,
    pub status: Option<String>,
    pub country: Option<String>,
}

impl CheckProfileResponse {
    pub fn not_taken() -> Self {
        Self {
            message: "notTaken".into(),
            profile_name: None,
            total_trophies: None,
            status: None,
            country: None,
        }
    }

    pub fn taken(profile: ProfileEntity) -> Self {
        Self {
            message: "taken".into(),
            profile_name: Some(profile.name),
            total_trophies: Some(profile.total_trophies),
            status: Some(profile.status),
            country: Some(profile.country),
        }
    }
}

/// Public projection of a profile.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub profile_name: String,
    pub total_trophies: u32,
    pub status: String,
    pub country: String,
    pub wins: u32,
}

impl From<ProfileEntity> for ProfileSummary {
    fn from(profile: ProfileEntity) -> Self {
        Self {
            profile_name: profile.name,
            total_trophies: profile.total_trophies,
            status: profile.status,
            country: profile.country,
            wins: profile.wins,
        }
    }
}

/// Generic acknowledgement used by mutating endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

/// Achievement unlock flags in display order: first victory, perfect round,
/// lightning reflexes, quiz champion, clutch performer.
#[derive(Debug, Serialize, ToSchema)]
pub struct AchievementsResponse {
    #[schema(value_type = Vec<bool>)]
    pub achievements: [bool; 5],
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub opponent: String,
    /// "won", "lost" or "draw".
    #[schema(value_type = String)]
    pub result: MatchResult,
    /// RFC 3339 timestamp.
    pub played_at: String,
}

impl From<HistoryEntryEntity> for HistoryItem {
    fn from(entry: HistoryEntryEntity) -> Self {
        Self {
            opponent: entry.opponent,
            result: entry.result,
            played_at: format_system_time(entry.played_at),
        }
    }
}

/// Match history, most recent first.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub history: Vec<HistoryItem>,
}
