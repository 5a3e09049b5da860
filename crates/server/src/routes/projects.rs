// crates/server/src/routes/projects.rs
//! Whole-project generation.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use game_builder_jobs::{JobKind, NewJob};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiResult;
use crate::routes::ai::JobAccepted;
use crate::routes::validate_prompt;
use crate::state::AppState;

const MAX_PROMPT_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct GenerateProjectRequest {
    pub prompt: String,
}

/// POST /api/projects/{id}/generate - Generate a whole game for a project.
pub async fn generate_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    payload: Result<Json<GenerateProjectRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let Json(req) = payload?;
    validate_prompt(&req.prompt, MAX_PROMPT_CHARS)?;

    let job = state.jobs.start_job(
        NewJob::new(project_id, JobKind::ProjectGeneration).params(json!({ "prompt": req.prompt })),
    )?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job,
            message: "Game generation started".to_string(),
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/projects/{id}/generate", post(generate_project))
}
