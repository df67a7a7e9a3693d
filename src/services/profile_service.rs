//! Profile lookups and edits backing the REST API.

use tracing::info;

use crate::{
    dao::models::ProfileEntity,
    dto::profile::{
        AchievementsResponse, ActionResponse, CheckProfileResponse, CreateProfileRequest,
        HistoryItem, HistoryResponse, ProfileSummary, UpdateProfileRequest,
    },
    error::ServiceError,
    state::SharedState,
};

/// Report whether `name` is taken, with the public profile when it is.
pub async fn check_profile(
    state: &SharedState,
    name: &str,
) -> Result<CheckProfileResponse, ServiceError> {
    let store = state.require_profile_store().await?;
    let response = match store.find_profile(name.to_owned()).await? {
        Some(profile) => CheckProfileResponse::taken(profile),
        None => CheckProfileResponse::not_taken(),
    };
    Ok(response)
}

/// Register a new profile with zeroed counters.
pub async fn create_profile(
    state: &SharedState,
    request: CreateProfileRequest,
) -> Result<ProfileSummary, ServiceError> {
    let store = state.require_profile_store().await?;
    let profile = ProfileEntity::new(
        request.profile_name,
        request.status.unwrap_or_default(),
        request.country.unwrap_or_default(),
    );
    store.create_profile(profile.clone()).await?;
    info!(name = %profile.name, "profile created");
    Ok(profile.into())
}

/// Apply a status or country change to an existing profile.
pub async fn update_profile(
    state: &SharedState,
    request: UpdateProfileRequest,
) -> Result<ActionResponse, ServiceError> {
    if request.status.is_none() && request.country.is_none() {
        return Err(ServiceError::NothingToUpdate);
    }

    let store = state.require_profile_store().await?;
    let updated = store
        .update_profile(
            request.profile_name.clone(),
            request.status,
            request.country,
        )
        .await?;
    if !updated {
        return Err(not_found(&request.profile_name));
    }

    Ok(ActionResponse {
        message: "Profile updated".into(),
    })
}

/// Top profiles by trophies, capped by the configured leaderboard size.
pub async fn leaderboard(state: &SharedState) -> Result<Vec<ProfileSummary>, ServiceError> {
    let store = state.require_profile_store().await?;
    let profiles = store.leaderboard(state.config().leaderboard_limit).await?;
    Ok(profiles.into_iter().map(ProfileSummary::from).collect())
}

/// Achievement flags of `name`.
pub async fn achievements(
    state: &SharedState,
    name: &str,
) -> Result<AchievementsResponse, ServiceError> {
    let profile = load_profile(state, name).await?;
    Ok(AchievementsResponse {
        achievements: profile.achievements.as_flags(),
    })
}

/// Match history, most recent first.
pub async fn history(state: &SharedState, name: &str) -> Result<HistoryResponse, ServiceError> {
    let profile = load_profile(state, name).await?;
    let history = profile
        .history
        .into_iter()
        .rev()
        .map(HistoryItem::from)
        .collect();
    Ok(HistoryResponse { history })
}

async fn load_profile(state: &SharedState, name: &str) -> Result<ProfileEntity, ServiceError> {
    let store = state.require_profile_store().await?;
    store
        .find_profile(name.to_owned())
        .await?
        .ok_or_else(|| not_found(name))
}

fn not_found(name: &str) -> ServiceError {
    ServiceError::ProfileNotFound {
        name: name.to_owned(),
    }
}
