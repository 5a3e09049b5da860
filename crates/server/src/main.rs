// crates/server/src/main.rs
//! Game builder server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use game_builder_jobs::{JobService, SimulatedWorker};
use game_builder_server::{
    create_app, init_metrics, spawn_retention_sweeper, AppState, Config, SWEEP_INTERVAL,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn,game_builder_server=info,game_builder_jobs=info,tower_http=info";

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().compact().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);
    init_metrics();

    let worker = Arc::new(SimulatedWorker::new(config.preview_base_url.clone()));
    let jobs = JobService::new(config.job_service_config()?, worker)?;
    let state = AppState::new(jobs.clone());

    let shutdown = CancellationToken::new();
    let sweeper = spawn_retention_sweeper(jobs, SWEEP_INTERVAL, shutdown.clone());

    let app = create_app(state);
    let addr = SocketAddr::new(config.host, config.port());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        step_secs = config.step_secs,
        time_scale = config.time_scale,
        allow_concurrent_jobs = config.allow_concurrent_jobs,
        "game builder server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    sweeper.await?;
    Ok(())
}
