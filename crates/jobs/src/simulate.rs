// crates/jobs/src/simulate.rs
//! Canned step worker standing in for real generation and build providers.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::{Agent, Platform};
use crate::error::StepError;
use crate::plan::Step;
use crate::sequencer::StepWorker;
use crate::types::{Job, JobKind};

pub const DEFAULT_PREVIEW_BASE_URL: &str = "https://demo.aigamebuilder.com";

/// Steps always succeed; results are fixed payloads shaped like the real ones.
#[derive(Debug, Clone)]
pub struct SimulatedWorker {
    preview_base_url: String,
}

impl SimulatedWorker {
    pub fn new(preview_base_url: impl Into<String>) -> Self {
        let mut preview_base_url = preview_base_url.into();
        while preview_base_url.ends_with('/') {
            preview_base_url.pop();
        }
        Self { preview_base_url }
    }

    fn ai_result(&self, job: &Job) -> Result<Value, StepError> {
        let agent: Agent = job
            .params
            .get("agent")
            .and_then(Value::as_str)
            .ok_or_else(|| StepError::new("job params carry no agent"))?
            .parse()
            .map_err(|e: crate::error::JobError| StepError::new(e.to_string()))?;

        Ok(json!({
            "agent": agent,
            "assets": agent.sample_assets(),
            "preview": format!("{}/preview/{}", self.preview_base_url, job.id),
            "metadata": {
                "quality": "high",
                "processingTime": 8.5,
                "tokensUsed": 1250,
            },
        }))
    }

    fn project_result(&self, job: &Job) -> Value {
        let project = job.resource_id.as_str();
        json!({
            "preview": {
                "webglUrl": format!("{}/play/{project}", self.preview_base_url),
                "screenshot": format!("{}/screenshots/{project}.png", self.preview_base_url),
            },
        })
    }

    fn build_result(&self, job: &Job) -> Result<Value, StepError> {
        let platforms: Vec<Platform> = match job.params.get("platforms") {
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| StepError::new(format!("bad platforms: {e}")))?,
            None => vec![Platform::Web],
        };
        let project = job.resource_id.as_str();
        let builds: Vec<Value> = platforms
            .iter()
            .map(|platform| {
                json!({
                    "platform": platform,
                    "fileName": format!("{project}-{platform}.zip"),
                    "downloadUrl": format!("/api/builds/{project}/download/{platform}"),
                })
            })
            .collect();
        Ok(json!({ "builds": builds }))
    }
}

impl Default for SimulatedWorker {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_BASE_URL)
    }
}

#[async_trait]
impl StepWorker for SimulatedWorker {
    async fn run_step(&self, _job: &Job, _step: &Step) -> Result<(), StepError> {
        Ok(())
    }

    async fn finish(&self, job: &Job) -> Result<Value, StepError> {
        match job.kind {
            JobKind::AiGeneration => self.ai_result(job),
            JobKind::ProjectGeneration => Ok(self.project_result(job)),
            JobKind::Build => self.build_result(job),
        }
    }
}
