pub mod connection;
pub mod outbox;
pub mod rate_limit;
pub mod rooms;
pub mod session;

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, watch};

use crate::{
    config::AppConfig,
    dao::profile_store::ProfileStore,
    error::ServiceError,
    state::{
        outbox::{SettlementJob, SettlementOutbox},
        rate_limit::SlidingWindowLimiter,
        rooms::RoomRegistry,
    },
};

/// Application state shared across handlers and background tasks.
pub type SharedState = Arc<AppState>;

/// Central application state: live rooms, the profile store handle and request limits.
pub struct AppState {
    config: AppConfig,
    profile_store: RwLock<Option<Arc<dyn ProfileStore>>>,
    degraded: watch::Sender<bool>,
    rooms: RoomRegistry,
    outbox: SettlementOutbox,
    rate_limiter: SlidingWindowLimiter,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`], along with the receiving
    /// end of the settlement outbox for the persistence worker.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> (SharedState, mpsc::Receiver<SettlementJob>) {
        let (degraded_tx, _rx) = watch::channel(true);
        let (outbox, settlements) = SettlementOutbox::channel(config.settlement_queue_capacity);
        let rate_limiter = SlidingWindowLimiter::from_config(&config.rate_limit);

        let state = Arc::new(Self {
            config,
            profile_store: RwLock::new(None),
            degraded: degraded_tx,
            rooms: RoomRegistry::new(),
            outbox,
            rate_limiter,
        });
        (state, settlements)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current profile store, if one is installed.
    pub async fn profile_store(&self) -> Option<Arc<dyn ProfileStore>> {
        self.profile_store.read().await.as_ref().cloned()
    }

    /// Current profile store, or [`ServiceError::Degraded`] when storage is unusable.
    pub async fn require_profile_store(&self) -> Result<Arc<dyn ProfileStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.profile_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new profile store implementation and leave degraded mode.
    pub async fn set_profile_store(&self, store: Arc<dyn ProfileStore>) {
        {
            let mut guard = self.profile_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    #[cfg(test)]
    pub(crate) fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Live duel rooms.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Queue feeding the settlement worker.
    pub fn outbox(&self) -> &SettlementOutbox {
        &self.outbox
    }

    /// Per-address limiter applied to the REST routes.
    pub fn rate_limiter(&self) -> &SlidingWindowLimiter {
        &self.rate_limiter
    }
}
