use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage health alongside the number of open rooms.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_profile_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let open_rooms = state.rooms().room_count().await;
    if state.is_degraded() {
        HealthResponse::degraded(open_rooms)
    } else {
        HealthResponse::ok(open_rooms)
    }
}
