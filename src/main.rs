//! Studio Sched binary entrypoint wiring REST, the task scheduler, push
//! delivery and the storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clock;
mod config;
mod dao;
mod domain;
mod dto;
mod error;
mod notify;
mod routes;
mod sched;
mod services;
mod state;

use clock::{Clock, SystemClock};
use notify::{FcmNotifier, LogNotifier, Notifier};
use sched::DelayQueue;
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_config = config::AppConfig::load();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier = build_notifier();
    let (queue, fired_tasks) = DelayQueue::new(Arc::clone(&clock));

    let app_state = AppState::new(app_config, notifier, queue, clock);

    tokio::spawn(services::task_dispatcher::run(
        app_state.clone(),
        fired_tasks,
    ));
    spawn_storage_supervisor(app_state.clone());

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the push transport: FCM when credentials are present, a logging
/// stub otherwise so local runs work without a Firebase project.
fn build_notifier() -> Arc<dyn Notifier> {
    match env::var("FCM_SERVER_KEY") {
        Ok(key) if !key.is_empty() => {
            info!("push delivery enabled via FCM");
            Arc::new(FcmNotifier::new(key))
        }
        _ => {
            warn!("FCM_SERVER_KEY not set; push delivery disabled");
            Arc::new(LogNotifier)
        }
    }
}

/// Keep a MongoDB-backed store connected, toggling degraded mode while it
/// is unreachable.
#[cfg(feature = "mongo-store")]
fn spawn_storage_supervisor(state: SharedState) {
    use dao::booking_store::BookingStore;
    use dao::booking_store::mongodb::{MongoBookingStore, MongoConfig};
    use dao::storage::StorageError;

    let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("MONGO_DB").ok();

    tokio::spawn(services::storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoBookingStore::connect(config).await?;
            Ok(Arc::new(store) as Arc<dyn BookingStore>)
        }
    }));
}

/// Without the MongoDB feature the process runs on the in-memory store.
/// Data does not survive a restart; useful for demos and local hacking.
#[cfg(not(feature = "mongo-store"))]
fn spawn_storage_supervisor(state: SharedState) {
    use dao::booking_store::memory::MemoryStore;

    tokio::spawn(async move {
        warn!("mongo-store feature disabled; using the volatile in-memory store");
        state
            .install_booking_store(Arc::new(MemoryStore::new()))
            .await;
    });
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
