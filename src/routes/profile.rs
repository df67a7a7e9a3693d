use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use axum_valid::Valid;

use crate::{
    dto::profile::{
        AchievementsResponse, ActionResponse, CheckProfileResponse, CreateProfileRequest,
        HistoryResponse, ProfileQuery, ProfileSummary, UpdateProfileRequest,
    },
    error::AppError,
    services::profile_service,
    state::SharedState,
};

/// Profile, leaderboard and history routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/check-profile", get(check_profile))
        .route("/create-profile", post(create_profile))
        .route("/update-profile-data", patch(update_profile))
        .route("/leaderboard-data", get(leaderboard))
        .route("/get-achievement-data", get(achievements))
        .route("/get-history-data", get(history))
}

/// Tell whether a display name is already registered.
#[utoipa::path(
    get,
    path = "/check-profile",
    tag = "profile",
    params(ProfileQuery),
    responses(
        (status = 200, description = "Lookup result", body = CheckProfileResponse),
        (status = 400, description = "Invalid profile name"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn check_profile(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<ProfileQuery>>,
) -> Result<Json<CheckProfileResponse>, AppError> {
    let response = profile_service::check_profile(&state, &query.profile_name).await?;
    Ok(Json(response))
}

/// Register a new profile with zero trophies.
#[utoipa::path(
    post,
    path = "/create-profile",
    tag = "profile",
    request_body = CreateProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = ProfileSummary),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn create_profile(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateProfileRequest>>,
) -> Result<(StatusCode, Json<ProfileSummary>), AppError> {
    let summary = profile_service::create_profile(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Change the status line or country of a profile.
#[utoipa::path(
    patch,
    path = "/update-profile-data",
    tag = "profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ActionResponse),
        (status = 404, description = "Unknown profile")
    )
)]
pub async fn update_profile(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<UpdateProfileRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let response = profile_service::update_profile(&state, payload).await?;
    Ok(Json(response))
}

/// Top profiles ordered by trophies.
#[utoipa::path(
    get,
    path = "/leaderboard-data",
    tag = "profile",
    responses((status = 200, description = "Top profiles by trophies", body = [ProfileSummary]))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ProfileSummary>>, AppError> {
    let profiles = profile_service::leaderboard(&state).await?;
    Ok(Json(profiles))
}

/// Achievement flags of a profile.
#[utoipa::path(
    get,
    path = "/get-achievement-data",
    tag = "profile",
    params(ProfileQuery),
    responses(
        (status = 200, description = "Achievement flags", body = AchievementsResponse),
        (status = 404, description = "Unknown profile")
    )
)]
pub async fn achievements(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<ProfileQuery>>,
) -> Result<Json<AchievementsResponse>, AppError> {
    let response = profile_service::achievements(&state, &query.profile_name).await?;
    Ok(Json(response))
}

/// Match history of a profile, most recent first.
#[utoipa::path(
    get,
    path = "/get-history-data",
    tag = "profile",
    params(ProfileQuery),
    responses(
        (status = 200, description = "Match history", body = HistoryResponse),
        (status = 404, description = "Unknown profile")
    )
)]
pub async fn history(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<ProfileQuery>>,
) -> Result<Json<HistoryResponse>, AppError> {
    let response = profile_service::history(&state, &query.profile_name).await?;
    Ok(Json(response))
}
