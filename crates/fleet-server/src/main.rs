//! Fleet Server - always-on backend for dispatch allocation and shipment tracking

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleet_server::api;
use fleet_server::config::Config;
use fleet_server::loops::persist_loop::run_persist_loop;
use fleet_server::persistence::{init_database, load_snapshot};
use fleet_server::state::{AppState, PersistQueue};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!config.log_json).then(tracing_subscriber::fmt::layer);
    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fleet_server=debug".parse()?),
        )
        .init();

    tracing::info!("Starting Fleet Server...");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut persist_task = None;

    let state = match &config.database_path {
        Some(path) => {
            let db = init_database(path, config.database_max_connections).await?;
            let snapshot = load_snapshot(db.pool()).await?;
            let (queue, rx) = PersistQueue::channel(config.persist_queue);
            let queue = Arc::new(queue);
            persist_task = Some(tokio::spawn(run_persist_loop(
                db,
                queue.clone(),
                rx,
                shutdown_tx.subscribe(),
            )));
            Arc::new(AppState::with_persistence(&config, queue, snapshot))
        }
        None => {
            tracing::warn!("FLEET_DATABASE_PATH is empty; running without persistence");
            Arc::new(AppState::new(&config))
        }
    };

    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {}", err);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // ignore send errors: the loop may already have exited
    let _ = shutdown_tx.send(());
    if let Some(task) = persist_task {
        if let Err(err) = task.await {
            tracing::warn!("Persistence loop ended abnormally: {}", err);
        }
    }

    Ok(())
}
