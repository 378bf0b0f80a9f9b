//! Documentation of the GearGuard maintenance backend.
//!
//! # General Infrastructure
//! - Dashboard polls the REST API, there is no push channel
//! - All shared state lives in the relational store, handlers keep nothing in memory between calls
//! - An optional ingestion simulator runs next to the handlers and inserts new work every interval
//!
//!
//!
//! # Endpoints
//!
//! - `GET /` liveness banner
//! - `GET /api/health`
//! - `GET /api/kanban` board grouped by the four status buckets
//! - `GET /api/maintenance/live` board plus `server_time`, for polling clients
//! - `GET /api/maintenance/{id}` full request, including its current `version`
//! - `PUT /api/maintenance/{id}/status` status transition, optional `version` for stale-write detection
//! - `POST /api/maintenance` new request, same insertion path as the simulator
//! - `GET /api/equipment`, `GET /api/equipment/{id}`
//! - `GET /api/equipment/health`
//! - `POST /api/equipment`
//!
//! Authentication and audit logging sit in front of this service, not inside it.
//!
//!
//!
//! # Notes
//!
//! ## Board consistency
//! The board is advisory monitoring data. A snapshot stamps `server_time` and then scans the
//! table, so rows the simulator inserts in between may or may not show up. That is accepted,
//! the next poll picks them up.
//!
//! ## Status races
//! Two clients moving the same card without a `version` resolve as last write wins. Passing
//! the version read from `GET /api/maintenance/{id}` turns the second write into a `409 Conflict`.
//!
//!
//!
//! # Setup
//!
//! Run the server with the simulator on.
//! ```sh
//! SIM_ENABLE=1 SIM_INTERVAL_SECONDS=5 RUST_LOG=info cargo run -p gearguard
//! ```
//!
//! Feed the simulator from a file instead of the templates.
//! ```sh
//! SIM_ENABLE=1 SIM_DATA_PATH=./data/equipment_anomaly_data.csv cargo run -p gearguard
//! ```
//!
//! Run a few ticks without the server.
//! ```sh
//! cargo run -p process -- --ticks 3 --interval 1
//! ```
//!
//! Watch the live board.
//! ```sh
//! cargo run -p tester -- --polls 10
//! ```
use std::{future::pending, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post, put},
};

use process::{Simulator, SimulatorConfig, SimulatorHandle};
use signal::ctrl_c;
#[cfg(unix)]
use signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use config::Config;
use routes::{
    create_equipment_handler, create_request_handler, equipment_health_handler,
    get_equipment_handler, get_request_handler, health_handler, kanban_handler, live_handler,
    list_equipment_handler, root_handler, update_status_handler,
};
use state::AppState;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    let simulator = start_simulator(&state).await;

    info!("Starting server...");
    let app = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    if let Some(handle) = simulator {
        handle.stop().await;
    }

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/kanban", get(kanban_handler))
        .route("/api/maintenance", post(create_request_handler))
        .route("/api/maintenance/live", get(live_handler))
        .route("/api/maintenance/{id}", get(get_request_handler))
        .route("/api/maintenance/{id}/status", put(update_status_handler))
        .route(
            "/api/equipment",
            get(list_equipment_handler).post(create_equipment_handler),
        )
        .route("/api/equipment/health", get(equipment_health_handler))
        .route("/api/equipment/{id}", get(get_equipment_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Spawns the simulator if `SIM_ENABLE` is set. The caller owns the handle.
pub async fn start_simulator(state: &AppState) -> Option<SimulatorHandle> {
    let settings = &state.config.simulator;

    if !settings.enabled {
        info!("Simulator disabled, set SIM_ENABLE=1 to turn it on");
        return None;
    }

    let simulator = Simulator::new(
        SimulatorConfig {
            data_path: settings.data_path.clone(),
            interval: settings.interval,
            seed: None,
        },
        state.store.clone(),
    )
    .await;

    Some(simulator.spawn(CancellationToken::new()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                error!("Failed to install Ctrl+C handler: {err}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!("Failed to install signal handler: {err}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
