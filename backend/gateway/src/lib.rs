//! Documentation of the GoML gateway.
//!
//! HTTP front door for the mlsolid experiment tracking service running in the
//! same cluster. Results are copied into Garage so they can be inspected
//! outside the cluster.
//!
//!
//!
//! # General Infrastructure
//! - Gateway pod exposes plain HTTP on `PORT`
//! - mlsolid is reached over gRPC at `MLSOLID_SERVICE_ADDR`, no TLS
//! - Garage is reached over its S3 API at `S3_ENDPOINT`, path-style, region `garage`
//! - Credentials come from `SA_ACCESS_KEY`/`SA_SECRET_KEY` or `/run/secrets`
//!
//!
//!
//! # Request Flow
//!
//! `GET /` answers with a fixed status line and never touches the network.
//!
//! `GET /predict`
//! - Dial mlsolid, a fresh connection for this request only
//! - Unreachable service: 500
//! - Call `Experiments`, or `TaggedModel` when `?name=&tag=` is given
//! - RPC failure or deadline (`RPC_TIMEOUT_SECS`, 5s): 503
//! - Serialize to JSON and write to Garage
//! - Write failure is logged and reported as `"status": "degraded"` with a 200
//! - Connection is dropped when the handler returns
//!
//!
//!
//! # Notes
//!
//! ## Connections
//! No pooling. Every request pays for a TCP + HTTP/2 handshake with mlsolid.
//! Traffic is low and the service sits on the same network, so the handshake
//! is cheap compared to the RPC itself.
//!
//! ## Persistence
//! Best effort. A failed upload never fails the request, the caller still gets
//! the data. Uploads are bounded by `S3_UPLOAD_TIMEOUT_SECS` so a stuck Garage
//! node cannot hold a handler forever.
//!
//!
//!
//! # Setup
//!
//! Run locally against port-forwarded services.
//! ```sh
//! kubectl port-forward svc/mlsolid-service 5000:5000
//! kubectl -n garage port-forward svc/garage-s3 3900:3900
//! MLSOLID_SERVICE_ADDR=localhost:5000 S3_ENDPOINT=http://localhost:3900 cargo run -p gateway
//! ```
//!
//! Check Garage credentials without the gateway.
//! ```sh
//! cargo run -p garage-check
//! ```
//!
//! One-shot export job.
//! ```sh
//! cargo run -p export -- --addr localhost:50051
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};

use signal::ctrl_c;
#[cfg(unix)]
use signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod pipeline;
pub mod remote;
pub mod routes;
pub mod state;
pub mod storage;

use config::Config;
use error::StartupError;
use routes::{health_handler, predict_handler};
use state::AppState;

/// `RUST_LOG` wins, `info` otherwise.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).init();
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(health_handler))
        .route("/predict", get(predict_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> Result<(), StartupError> {
    init_logging();

    info!("Loading configuration...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
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
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
