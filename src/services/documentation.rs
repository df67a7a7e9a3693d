use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz duel backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::profile::check_profile,
        crate::routes::profile::create_profile,
        crate::routes::profile::update_profile,
        crate::routes::profile::leaderboard,
        crate::routes::profile::achievements,
        crate::routes::profile::history,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ScoreReport,
            crate::dto::ws::MatchFound,
            crate::dto::ws::ScoreRelay,
            crate::dto::profile::CreateProfileRequest,
            crate::dto::profile::UpdateProfileRequest,
            crate::dto::profile::CheckProfileResponse,
            crate::dto::profile::ProfileSummary,
            crate::dto::profile::ActionResponse,
            crate::dto::profile::AchievementsResponse,
            crate::dto::profile::HistoryItem,
            crate::dto::profile::HistoryResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "profile", description = "Player profiles, leaderboard and match history"),
        (name = "duel", description = "WebSocket channel for matchmaking and score relay"),
    )
)]
pub struct ApiDoc;
