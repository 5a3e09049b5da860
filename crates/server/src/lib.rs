// crates/server/src/lib.rs
//! Game builder server library.
//!
//! Axum HTTP API over the job service: endpoints that start AI generation,
//! project generation and build jobs, polling endpoints, and the realtime
//! transports (WebSocket and SSE) that carry job progress to clients joined
//! to a project.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::Config;
pub use error::*;
pub use metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use game_builder_jobs::JobService;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// How often finished jobs past their retention window are pruned.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes under `/api`
/// - The `/ws` realtime endpoint and `/metrics`
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let realtime = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(Arc::clone(&state));

    Router::new()
        .merge(api_routes(state))
        .merge(realtime)
        .route("/metrics", get(metrics::metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Periodically drop finished jobs older than the service's retention window.
///
/// Runs until `shutdown` is cancelled.
pub fn spawn_retention_sweeper(
    jobs: JobService,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = jobs.prune_finished();
                    tracing::debug!(removed, "retention sweep");
                }
            }
        }
    })
}
