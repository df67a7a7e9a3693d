use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::documentation::ApiDoc;

/// Path of the interactive Swagger UI.
pub const SWAGGER_UI_PATH: &str = "/docs";
/// Path serving the raw OpenAPI document consumed by the UI.
pub const OPENAPI_JSON_PATH: &str = "/api-doc/openapi.json";

/// Swagger UI for the profile and duel API. Holds no application state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().merge(SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_JSON_PATH, ApiDoc::openapi()))
}
