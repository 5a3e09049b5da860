// crates/jobs/src/error.rs
//! Error types for the job system.

use thiserror::Error;

use crate::types::{JobId, JobStatus};

/// Errors returned synchronously by the registry, sequencer and service.
///
/// Step failures are not part of this enum: they are recorded on the job
/// (see [`StepFailure`]) and never surface to the caller that started it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("invalid transition for job {id}: {reason} (status: {status})")]
    InvalidTransition {
        id: JobId,
        status: JobStatus,
        reason: String,
    },

    #[error("invalid state for job {id}: {reason}")]
    InvalidState { id: JobId, reason: String },

    #[error("resource {resource_id} already has an active job ({active})")]
    Conflict { resource_id: String, active: JobId },

    #[error("invalid step plan: {0}")]
    InvalidPlan(String),
}

pub type Result<T> = std::result::Result<T, JobError>;

/// Failure raised by a step body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct StepError(pub String);

impl StepError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Why a running job moved to `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepFailure {
    #[error("step '{label}' failed: {source}")]
    Step { label: String, source: StepError },

    #[error("result generation failed: {0}")]
    Result(StepError),

    #[error("cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}
