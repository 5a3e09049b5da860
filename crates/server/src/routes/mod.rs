// crates/server/src/routes/mod.rs
//! API route handlers for the game builder server.

pub mod ai;
pub mod builds;
pub mod events;
pub mod health;
pub mod jobs;
pub mod projects;

use std::sync::Arc;

use axum::Router;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MIN_PROMPT_CHARS: usize = 10;

/// Prompts are measured in characters, not bytes.
pub(crate) fn validate_prompt(prompt: &str, max_chars: usize) -> ApiResult<()> {
    let len = prompt.chars().count();
    if !(MIN_PROMPT_CHARS..=max_chars).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "Prompt must be between {MIN_PROMPT_CHARS} and {max_chars} characters"
        )));
    }
    Ok(())
}

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - GET  /api/ai/agents - Generation agent catalogue
/// - POST /api/ai/generate - Start an AI generation job
/// - POST /api/projects/{id}/generate - Start a whole-project generation job
/// - GET  /api/projects/{id}/events - SSE stream of the project's job events
/// - POST /api/builds/{projectId} - Start a platform build job
/// - GET  /api/jobs - List jobs
/// - GET  /api/jobs/{id} - Poll one job
/// - POST /api/jobs/{id}/cancel - Cancel a job
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", ai::router())
        .nest("/api", projects::router())
        .nest("/api", events::router())
        .nest("/api", builds::router())
        .nest("/api", jobs::router())
        .with_state(state)
}
