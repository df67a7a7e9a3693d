use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{Achievement, QUIZ_CHAMPION_STREAK},
        profile_store::ProfileStore,
        storage::StorageResult,
    },
    services::outcome::PlayerSettlement,
    state::{SharedState, outbox::SettlementJob},
};

/// Drain the settlement outbox, applying each job against the installed profile store.
///
/// Jobs are dropped (and logged) while storage is degraded or when a write fails.
pub async fn run(state: SharedState, mut jobs: mpsc::Receiver<SettlementJob>) {
    while let Some(job) = jobs.recv().await {
        let store = match state.require_profile_store().await {
            Ok(store) => store,
            Err(err) => {
                warn!(
                    room_id = %job.room_id,
                    player = %job.settlement.name,
                    error = %err,
                    "dropping settlement"
                );
                continue;
            }
        };

        let name = job.settlement.name.clone();
        match apply_settlement(store.as_ref(), job.settlement).await {
            Ok(true) => debug!(room_id = %job.room_id, player = %name, "settlement applied"),
            Ok(false) => debug!(room_id = %job.room_id, player = %name, "no profile for player; settlement skipped"),
            Err(err) => warn!(
                room_id = %job.room_id,
                player = %name,
                error = %err,
                "failed to apply settlement"
            ),
        }
    }

    info!("settlement outbox closed; worker stopping");
}

/// Apply one settlement. Returns `false` when the player has no profile.
pub async fn apply_settlement(
    store: &dyn ProfileStore,
    settlement: PlayerSettlement,
) -> StorageResult<bool> {
    let PlayerSettlement {
        name,
        trophy_delta,
        record_win,
        achievements,
        history,
    } = settlement;

    if !store.apply_trophy_delta(name.clone(), trophy_delta).await? {
        return Ok(false);
    }
    if record_win {
        store.increment_win_counter(name.clone()).await?;
    }
    for achievement in achievements {
        store.set_achievement_flag(name.clone(), achievement).await?;
    }
    if let Some(streak) = store.append_history(name.clone(), history).await? {
        if streak >= QUIZ_CHAMPION_STREAK {
            store
                .set_achievement_flag(name, Achievement::QuizChampion)
                .await?;
        }
    }
    Ok(true)
}
