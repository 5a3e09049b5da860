// crates/jobs/src/event.rs
//! Events fanned out to a resource's subscribers on every job transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::Step;
use crate::types::{Job, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    JobProgress,
    JobCompleted,
    JobFailed,
}

/// The step a progress event reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub index: i32,
    pub label: String,
    pub message: String,
}

/// Snapshot of a job after a transition, tagged with the kind's channel name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub channel: String,
    pub kind: JobEventKind,
    pub job: Job,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepSummary>,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn progress(job: &Job, step: &Step) -> Self {
        Self {
            channel: job.kind.channel().to_string(),
            kind: JobEventKind::JobProgress,
            job: job.clone(),
            step: Some(StepSummary {
                index: job.current_step_index,
                label: step.label.clone(),
                message: step.message.clone(),
            }),
            timestamp: Utc::now(),
        }
    }

    /// Terminal event for a completed or failed job.
    pub fn finished(job: &Job) -> Self {
        let kind = match job.status {
            JobStatus::Completed => JobEventKind::JobCompleted,
            _ => JobEventKind::JobFailed,
        };
        Self {
            channel: job.kind.channel().to_string(),
            kind,
            job: job.clone(),
            step: None,
            timestamp: Utc::now(),
        }
    }
}
