// crates/server/src/config.rs
//! Command-line and environment configuration.

use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;
use game_builder_jobs::{ConcurrencyPolicy, JobServiceConfig, DEFAULT_PREVIEW_BASE_URL};
use thiserror::Error;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47900;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("step duration must be a non-negative number of seconds, got {0}")]
    StepDuration(f64),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "game-builder", version, about = "Game builder job server")]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "GAME_BUILDER_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to bind. Falls back to `PORT`, then the built-in default.
    #[arg(long, env = "GAME_BUILDER_PORT")]
    pub port: Option<u16>,

    /// Seconds each simulated step takes.
    #[arg(long, env = "GAME_BUILDER_STEP_SECS", default_value_t = 2.0)]
    pub step_secs: f64,

    /// Multiplier applied to every step wait. `0` runs jobs without delay.
    #[arg(long, env = "GAME_BUILDER_TIME_SCALE", default_value_t = 1.0)]
    pub time_scale: f64,

    /// Fail jobs still running after this many seconds.
    #[arg(long, env = "GAME_BUILDER_JOB_DEADLINE_SECS")]
    pub job_deadline_secs: Option<u64>,

    /// Keep finished jobs queryable for this many seconds.
    #[arg(long, env = "GAME_BUILDER_RETENTION_SECS", default_value_t = 3600)]
    pub retention_secs: u64,

    /// Let several jobs run for one project at the same time.
    #[arg(long, env = "GAME_BUILDER_ALLOW_CONCURRENT_JOBS")]
    pub allow_concurrent_jobs: bool,

    /// Base URL for generated preview links.
    #[arg(long, env = "GAME_BUILDER_PREVIEW_BASE_URL", default_value = DEFAULT_PREVIEW_BASE_URL)]
    pub preview_base_url: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "GAME_BUILDER_LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| std::env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn job_service_config(&self) -> Result<JobServiceConfig, ConfigError> {
        let step_duration = Duration::try_from_secs_f64(self.step_secs)
            .map_err(|_| ConfigError::StepDuration(self.step_secs))?;
        let policy = if self.allow_concurrent_jobs {
            ConcurrencyPolicy::Allow
        } else {
            ConcurrencyPolicy::Reject
        };

        Ok(JobServiceConfig {
            step_duration,
            time_scale: self.time_scale,
            deadline: self.job_deadline_secs.map(Duration::from_secs),
            retention: Duration::from_secs(self.retention_secs),
            policy,
        })
    }
}
