//! Quiz duel backend entrypoint wiring the REST API, the duel WebSocket channel and storage.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_duel_back::{
    config::{AppConfig, StoreBackend},
    dao::profile_store::memory::InMemoryProfileStore,
    routes,
    services::settlement_worker,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port;
    let (app_state, settlements) = AppState::new(config);

    tokio::spawn(settlement_worker::run(app_state.clone(), settlements));
    install_storage(&app_state).await?;
    tokio::spawn(sweep_rate_limiter(app_state.clone()));

    let app = routes::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the configured profile store, or start supervising it in the background.
async fn install_storage(state: &SharedState) -> anyhow::Result<()> {
    match state.config().storage.backend {
        StoreBackend::Memory => {
            info!("using in-memory profile store");
            state
                .set_profile_store(Arc::new(InMemoryProfileStore::new()))
                .await;
        }
        StoreBackend::Mongo => spawn_mongo_supervisor(state)?,
    }
    Ok(())
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: &SharedState) -> anyhow::Result<()> {
    use quiz_duel_back::{
        dao::profile_store::{
            ProfileStore,
            mongodb::{MongoConfig, MongoProfileStore},
        },
        services::storage_supervisor,
    };

    let uri = state.config().storage.mongo_uri.clone();
    let db_name = state.config().storage.mongo_db.clone();
    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
            let store = MongoProfileStore::connect(config).await?;
            Ok(Arc::new(store) as Arc<dyn ProfileStore>)
        }
    }));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: &SharedState) -> anyhow::Result<()> {
    anyhow::bail!("storage backend `mongo` requires the `mongo-store` feature")
}

/// Periodically forget clients that have been idle for a full window.
async fn sweep_rate_limiter(state: SharedState) {
    let period = state.rate_limiter().window().max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        state.rate_limiter().sweep();
        debug!(
            clients = state.rate_limiter().tracked_clients(),
            "rate limiter swept"
        );
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
