// crates/jobs/src/registry.rs
//! Authoritative in-memory store of job records.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Deserialize;

use crate::error::{JobError, Result};
use crate::types::{Job, JobId, JobKind, ResourceId, Transition};

/// What to do when a job is requested for a resource that already has one in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Refuse with [`JobError::Conflict`] until the active job is terminal.
    #[default]
    Reject,
    /// Let jobs for one resource run side by side.
    Allow,
}

/// Filter for [`JobRegistry::list`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilter {
    pub resource_id: Option<ResourceId>,
    pub kind: Option<JobKind>,
    /// Only pending or running jobs.
    #[serde(default)]
    pub active: bool,
}

impl JobFilter {
    fn matches(&self, job: &Job) -> bool {
        self.resource_id
            .as_ref()
            .map_or(true, |rid| *rid == job.resource_id)
            && self.kind.map_or(true, |k| k == job.kind)
            && (!self.active || !job.status.is_terminal())
    }
}

/// Job records keyed by id.
///
/// Updates to one job are serialised by the map's shard lock; updates to
/// different jobs proceed independently.
pub struct JobRegistry {
    jobs: DashMap<JobId, Job>,
    /// Non-terminal job per resource, maintained only under [`ConcurrencyPolicy::Reject`].
    active: DashMap<ResourceId, JobId>,
    policy: ConcurrencyPolicy,
}

impl JobRegistry {
    pub fn new(policy: ConcurrencyPolicy) -> Self {
        Self {
            jobs: DashMap::new(),
            active: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Allocate a new `pending` job for `resource_id`.
    pub fn create(
        &self,
        resource_id: ResourceId,
        kind: JobKind,
        params: serde_json::Value,
    ) -> Result<Job> {
        let job = Job::new(resource_id.clone(), kind, params);

        match self.policy {
            ConcurrencyPolicy::Allow => {
                self.jobs.insert(job.id, job.clone());
            }
            ConcurrencyPolicy::Reject => match self.active.entry(resource_id) {
                Entry::Occupied(entry) => {
                    return Err(JobError::Conflict {
                        resource_id: entry.key().to_string(),
                        active: *entry.get(),
                    });
                }
                Entry::Vacant(entry) => {
                    self.jobs.insert(job.id, job.clone());
                    entry.insert(job.id);
                }
            },
        }

        tracing::debug!(job_id = %job.id, resource_id = %job.resource_id, kind = %kind, "job created");
        Ok(job)
    }

    pub fn get(&self, id: JobId) -> Result<Job> {
        self.jobs
            .get(&id)
            .map(|job| job.clone())
            .ok_or(JobError::NotFound(id))
    }

    /// Apply a validated transition and return the updated snapshot.
    pub fn update(&self, id: JobId, transition: Transition) -> Result<Job> {
        let snapshot = {
            let mut job = self.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
            job.apply(transition)?;
            job.clone()
        };

        // The shard guard above is released before touching `active`; `create`
        // takes the two maps in the opposite order.
        if snapshot.status.is_terminal() && self.policy == ConcurrencyPolicy::Reject {
            self.active
                .remove_if(&snapshot.resource_id, |_, active| *active == id);
        }

        Ok(snapshot)
    }

    /// Jobs matching `filter`, newest first.
    pub fn list(&self, filter: &JobFilter) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Drop terminal jobs last updated before `cutoff`. Returns how many were removed.
    pub fn prune_terminal(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !job.status.is_terminal() || job.updated_at >= cutoff);
        before.saturating_sub(self.jobs.len())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(ConcurrencyPolicy::default())
    }
}
