use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{profile_store::ProfileStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the profile store and keep the shared state in degraded mode while it is unavailable.
///
/// Matchmaking and relay never depend on storage, so only REST reads and the
/// settlement worker observe the degraded flag.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ProfileStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_profile_store(store.clone()).await;
                info!("profile store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_health(&state, store.as_ref()).await;
                warn!("exhausted profile store reconnect attempts; reconnecting from scratch");
            }
            Err(err) => {
                warn!(error = %err, "profile store connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = next_delay(delay);
    }
}

/// Poll the store until it fails and cannot be revived in place.
async fn watch_health(state: &SharedState, store: &dyn ProfileStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("profile store healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "profile store health check failed; entering degraded mode");
                state.update_degraded(true);
                if !reconnect(store).await {
                    return;
                }
                info!("profile store reconnected after health check failure");
                state.update_degraded(false);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect(store: &dyn ProfileStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "profile store reconnect attempt failed");
                sleep(delay).await;
                delay = next_delay(delay);
            }
        }
    }
    false
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}
