// crates/server/src/routes/builds.rs
//! Platform builds.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use game_builder_jobs::{JobKind, NewJob, Platform};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::routes::ai::JobAccepted;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct BuildRequest {
    pub platforms: Option<Vec<Platform>>,
}

impl BuildRequest {
    /// Requested platforms in first-seen order, `["web"]` when omitted.
    fn platforms(self) -> ApiResult<Vec<Platform>> {
        let requested = self.platforms.unwrap_or_else(|| vec![Platform::Web]);
        if requested.is_empty() {
            return Err(ApiError::BadRequest(
                "at least one platform is required".into(),
            ));
        }
        let mut platforms = Vec::with_capacity(requested.len());
        for platform in requested {
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        Ok(platforms)
    }
}

/// POST /api/builds/{projectId} - Build the project for one or more platforms.
///
/// The body is optional; an empty body builds for the web.
pub async fn start_build(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let request: BuildRequest = if body.iter().all(u8::is_ascii_whitespace) {
        BuildRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    let platforms = request.platforms()?;

    let job = state.jobs.start_job(
        NewJob::new(project_id, JobKind::Build).params(json!({ "platforms": platforms })),
    )?;

    let names: Vec<&str> = platforms.iter().map(|p| p.as_str()).collect();
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job,
            message: format!("Build started for {}", names.join(", ")),
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/builds/{project_id}", post(start_build))
}
