// crates/server/src/routes/jobs.rs
//! Job polling and cancellation.
//!
//! Realtime subscribers get every transition pushed to them; these endpoints
//! are the fallback for clients that poll.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use game_builder_jobs::{Job, JobFilter, JobId};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub total: usize,
}

/// GET /api/jobs?resourceId=&kind=&active= - List jobs, newest first.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    filter: Result<Query<JobFilter>, QueryRejection>,
) -> ApiResult<Json<JobListResponse>> {
    let Query(filter) = filter?;
    let jobs = state.jobs.list_jobs(&filter);
    Ok(Json(JobListResponse {
        total: jobs.len(),
        jobs,
    }))
}

/// GET /api/jobs/{id} - Current snapshot of one job.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id: JobId = id.parse()?;
    Ok(Json(state.jobs.get_job(id)?))
}

/// POST /api/jobs/{id}/cancel - Request cancellation of a pending or running job.
///
/// Answers 202 with the pre-cancellation snapshot; the `failed` transition
/// arrives through the realtime channels.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let id: JobId = id.parse()?;
    let job = state.jobs.cancel_job(id)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/cancel", post(cancel_job))
}
