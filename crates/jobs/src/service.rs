// crates/jobs/src/service.rs
//! The job façade used by request handlers.
//!
//! `JobService` ties the registry, plans, sequencer and router together:
//! starting a job records it, spawns its run on the tokio runtime and returns
//! the `pending` snapshot at once. Progress then flows to the owning
//! resource's subscribers as [`JobEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{JobError, Result};
use crate::event::JobEvent;
use crate::plan::{PlanBook, Step, StepPlan, DEFAULT_STEP_DURATION};
use crate::registry::{ConcurrencyPolicy, JobFilter, JobRegistry};
use crate::router::SubscriptionRouter;
use crate::sequencer::{Pacing, StepObserver, StepSequencer, StepWorker};
use crate::types::{Job, JobId, JobKind, ResourceId};

/// Default time finished jobs stay queryable.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct JobServiceConfig {
    /// Duration of every step in the built-in plans.
    pub step_duration: Duration,
    /// Multiplier applied to step durations at run time.
    pub time_scale: f64,
    /// Wall-clock budget per job.
    pub deadline: Option<Duration>,
    /// How long terminal jobs are kept before [`JobService::prune_finished`] drops them.
    pub retention: Duration,
    pub policy: ConcurrencyPolicy,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            step_duration: DEFAULT_STEP_DURATION,
            time_scale: 1.0,
            deadline: None,
            retention: DEFAULT_RETENTION,
            policy: ConcurrencyPolicy::default(),
        }
    }
}

/// Request to start a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    resource_id: String,
    kind: JobKind,
    params: Value,
    plan: Option<StepPlan>,
}

impl NewJob {
    pub fn new(resource_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            resource_id: resource_id.into(),
            kind,
            params: Value::Object(Default::default()),
            plan: None,
        }
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Run with `plan` instead of the kind's registered plan.
    pub fn plan(mut self, plan: StepPlan) -> Self {
        self.plan = Some(plan);
        self
    }
}

struct Inner {
    registry: Arc<JobRegistry>,
    router: Arc<SubscriptionRouter>,
    sequencer: StepSequencer,
    plans: PlanBook,
    cancels: DashMap<JobId, CancellationToken>,
    retention: Duration,
}

/// Cheaply cloneable handle to the job system.
#[derive(Clone)]
pub struct JobService {
    inner: Arc<Inner>,
}

impl JobService {
    pub fn new(config: JobServiceConfig, worker: Arc<dyn StepWorker>) -> Result<Self> {
        let plans = PlanBook::standard(config.step_duration);
        Self::with_plans(config, worker, plans)
    }

    pub fn with_plans(
        config: JobServiceConfig,
        worker: Arc<dyn StepWorker>,
        plans: PlanBook,
    ) -> Result<Self> {
        let pacing = Pacing::new(config.time_scale)?;
        let registry = Arc::new(JobRegistry::new(config.policy));
        let sequencer = StepSequencer::new(Arc::clone(&registry), worker)
            .with_pacing(pacing)
            .with_deadline(config.deadline);

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                router: Arc::new(SubscriptionRouter::new()),
                sequencer,
                plans,
                cancels: DashMap::new(),
                retention: config.retention,
            }),
        })
    }

    /// Record a new job and start running it in the background.
    ///
    /// Returns the `pending` snapshot without waiting for any step. Fails only
    /// on invalid input ([`JobError::InvalidArgument`], [`JobError::InvalidPlan`])
    /// or a [`JobError::Conflict`] with the resource's active job.
    pub fn start_job(&self, new: NewJob) -> Result<Job> {
        let resource_id = ResourceId::new(new.resource_id)?;
        let plan = match new.plan {
            Some(plan) => plan,
            None => self.inner.plans.plan_for(new.kind)?,
        };

        let job = self.inner.registry.create(resource_id, new.kind, new.params)?;
        let cancel = CancellationToken::new();
        self.inner.cancels.insert(job.id, cancel.clone());
        crate::metrics::record_started(job.kind);

        let span = tracing::info_span!(
            "job",
            job_id = %job.id,
            resource_id = %job.resource_id,
            kind = %job.kind,
        );
        let inner = Arc::clone(&self.inner);
        let id = job.id;
        tokio::spawn(
            async move {
                let observer = ScopeBroadcaster {
                    router: Arc::clone(&inner.router),
                };
                if let Err(e) = inner.sequencer.run(id, &plan, &cancel, &observer).await {
                    tracing::error!(error = %e, "job run aborted");
                }
                inner.cancels.remove(&id);
            }
            .instrument(span),
        );

        tracing::info!(job_id = %job.id, resource_id = %job.resource_id, kind = %job.kind, "job accepted");
        Ok(job)
    }

    pub fn get_job(&self, id: JobId) -> Result<Job> {
        self.inner.registry.get(id)
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Vec<Job> {
        self.inner.registry.list(filter)
    }

    /// Ask a pending or running job to stop.
    ///
    /// The job fails with `"cancelled"` at its next suspension point; the
    /// returned snapshot is taken before that happens.
    pub fn cancel_job(&self, id: JobId) -> Result<Job> {
        let job = self.inner.registry.get(id)?;
        if job.status.is_terminal() {
            return Err(JobError::InvalidState {
                id,
                reason: format!("job is already {}", job.status),
            });
        }
        match self.inner.cancels.get(&id) {
            Some(token) => token.cancel(),
            None => {
                return Err(JobError::InvalidState {
                    id,
                    reason: "job is finishing".into(),
                })
            }
        }
        tracing::info!(job_id = %id, "job cancellation requested");
        Ok(job)
    }

    /// Drop terminal jobs older than the retention window.
    pub fn prune_finished(&self) -> usize {
        let retention = chrono::Duration::from_std(self.inner.retention)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            return 0;
        };
        let removed = self.inner.registry.prune_terminal(cutoff);
        if removed > 0 {
            tracing::debug!(removed, "pruned finished jobs");
        }
        removed
    }

    /// The router realtime transports join subscribers to.
    pub fn router(&self) -> &Arc<SubscriptionRouter> {
        &self.inner.router
    }

    pub fn job_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn active_job_count(&self) -> usize {
        self.inner.cancels.len()
    }
}

/// Publishes each transition to the job's resource scope.
struct ScopeBroadcaster {
    router: Arc<SubscriptionRouter>,
}

impl StepObserver for ScopeBroadcaster {
    fn on_step(&self, job: &Job, step: &Step) {
        self.router
            .publish(&job.resource_id, &JobEvent::progress(job, step));
    }

    fn on_finish(&self, job: &Job) {
        self.router
            .publish(&job.resource_id, &JobEvent::finished(job));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::SimulatedWorker;
    use crate::types::JobStatus;

    fn service(config: JobServiceConfig) -> JobService {
        JobService::new(config, Arc::new(SimulatedWorker::default())).unwrap()
    }

    #[test]
    fn test_rejects_bad_time_scale() {
        let config = JobServiceConfig {
            time_scale: -2.0,
            ..Default::default()
        };
        assert!(JobService::new(config, Arc::new(SimulatedWorker::default())).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_job_rejects_blank_resource() {
        let svc = service(JobServiceConfig::default());
        let err = svc
            .start_job(NewJob::new("   ", JobKind::Build))
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidArgument(_)));
        assert_eq!(svc.job_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_terminal_job_is_invalid_state() {
        let svc = service(JobServiceConfig::default());
        let job = svc
            .start_job(NewJob::new("p1", JobKind::Build).params(serde_json::json!({"platforms": ["web"]})))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(svc.get_job(job.id).unwrap().status, JobStatus::Completed);
        assert!(matches!(
            svc.cancel_job(job.id),
            Err(JobError::InvalidState { .. })
        ));
        assert_eq!(svc.active_job_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_respects_retention() {
        let svc = service(JobServiceConfig {
            retention: Duration::ZERO,
            time_scale: 0.0,
            ..Default::default()
        });
        let job = svc.start_job(NewJob::new("p1", JobKind::ProjectGeneration)).unwrap();
        // Paused time only auto-advances once the job task is idle.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(svc.get_job(job.id).unwrap().status.is_terminal());
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(svc.prune_finished(), 1);
        assert!(matches!(svc.get_job(job.id), Err(JobError::NotFound(_))));
    }
}
