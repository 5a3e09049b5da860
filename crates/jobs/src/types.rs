// crates/jobs/src/types.rs
//! Core job types: identities, kinds, statuses and the job record itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{JobError, Result};

/// Longest accepted resource identifier, in bytes.
pub const MAX_RESOURCE_ID_LEN: usize = 128;

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for JobId {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| JobError::InvalidArgument(format!("malformed job id: {s}")))
    }
}

/// Identity of the resource (project) whose subscribers receive a job's events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Build a resource id. Surrounding whitespace is trimmed; the result must
    /// be non-empty and at most [`MAX_RESOURCE_ID_LEN`] bytes.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(JobError::InvalidArgument(
                "resource id must not be empty".into(),
            ));
        }
        if trimmed.len() > MAX_RESOURCE_ID_LEN {
            return Err(JobError::InvalidArgument(format!(
                "resource id longer than {MAX_RESOURCE_ID_LEN} bytes"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceId {
    type Error = JobError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of a job. Purely descriptive: every kind runs the same state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    AiGeneration,
    ProjectGeneration,
    Build,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::AiGeneration,
        JobKind::ProjectGeneration,
        JobKind::Build,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::AiGeneration => "ai-generation",
            JobKind::ProjectGeneration => "project-generation",
            JobKind::Build => "build",
        }
    }

    /// Realtime channel name clients listen on for this kind's events.
    pub fn channel(self) -> &'static str {
        match self {
            JobKind::AiGeneration => "ai_progress",
            JobKind::ProjectGeneration => "generation_progress",
            JobKind::Build => "build_progress",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked, multi-step background task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub resource_id: ResourceId,
    pub kind: JobKind,
    pub status: JobStatus,
    /// `-1` until the first step is applied.
    pub current_step_index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    pub progress: u8,
    /// Request parameters. Opaque to the state machine.
    pub params: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A state change requested of the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Start,
    Advance {
        step_index: i32,
        progress: u8,
        label: String,
    },
    Complete {
        result: serde_json::Value,
    },
    Fail {
        error: String,
    },
}

impl Job {
    pub fn new(resource_id: ResourceId, kind: JobKind, params: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            resource_id,
            kind,
            status: JobStatus::Pending,
            current_step_index: -1,
            current_step: None,
            progress: 0,
            params,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a transition. On error the job is left untouched.
    pub fn apply(&mut self, transition: Transition) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.reject("job is already terminal"));
        }

        match transition {
            Transition::Start => {
                if self.status != JobStatus::Pending {
                    return Err(self.reject("only a pending job can start"));
                }
                self.status = JobStatus::Running;
            }
            Transition::Advance {
                step_index,
                progress,
                label,
            } => {
                if self.status != JobStatus::Running {
                    return Err(self.reject("only a running job can advance"));
                }
                if step_index != self.current_step_index + 1 {
                    return Err(self.reject(format!(
                        "step index must advance by one (current {}, requested {step_index})",
                        self.current_step_index
                    )));
                }
                if progress < self.progress || progress > 100 {
                    return Err(self.reject(format!(
                        "progress must stay within {}..=100 (requested {progress})",
                        self.progress
                    )));
                }
                self.current_step_index = step_index;
                self.current_step = Some(label);
                self.progress = progress;
            }
            Transition::Complete { result } => {
                if self.status != JobStatus::Running {
                    return Err(self.reject("only a running job can complete"));
                }
                if self.progress != 100 {
                    return Err(self.reject(format!(
                        "cannot complete at {}% progress",
                        self.progress
                    )));
                }
                self.status = JobStatus::Completed;
                self.result = Some(result);
            }
            Transition::Fail { error } => {
                if self.status != JobStatus::Running {
                    return Err(self.reject("only a running job can fail"));
                }
                self.status = JobStatus::Failed;
                self.error = Some(error);
            }
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    fn reject(&self, reason: impl Into<String>) -> JobError {
        JobError::InvalidTransition {
            id: self.id,
            status: self.status,
            reason: reason.into(),
        }
    }
}
