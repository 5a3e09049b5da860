// crates/server/src/routes/ai.rs
//! AI asset generation endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use game_builder_jobs::{Agent, AgentInfo, Job, JobKind, NewJob};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiResult;
use crate::routes::validate_prompt;
use crate::state::AppState;

const MAX_PROMPT_CHARS: usize = 1000;

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentInfo>,
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub project_id: String,
    pub agent: String,
    pub prompt: String,
}

/// 202 body for every job-starting endpoint.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job: Job,
    pub message: String,
}

/// GET /api/ai/agents - The generation agent catalogue.
pub async fn list_agents() -> Json<AgentsResponse> {
    Json(AgentsResponse {
        agents: Agent::ALL.into_iter().map(AgentInfo::from).collect(),
        message: "Available AI agents for game development",
    })
}

/// POST /api/ai/generate - Start an AI generation job for a project.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let Json(req) = payload?;
    let agent: Agent = req.agent.parse()?;
    validate_prompt(&req.prompt, MAX_PROMPT_CHARS)?;

    let job = state.jobs.start_job(
        NewJob::new(req.project_id, JobKind::AiGeneration).params(json!({
            "agent": agent,
            "prompt": req.prompt,
        })),
    )?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job,
            message: format!("{} is now generating assets...", agent.name()),
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ai/agents", get(list_agents))
        .route("/ai/generate", post(generate))
}
