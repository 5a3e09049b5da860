// crates/jobs/src/sequencer.rs
//! Drives one job through its step plan.
//!
//! The sequencer is the registry's only writer for a running job. Each step
//! is fully applied (registry update, then observer) before the next wait
//! begins, so observers see a job's steps strictly in order.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{JobError, Result, StepError, StepFailure};
use crate::plan::{Step, StepPlan};
use crate::registry::JobRegistry;
use crate::types::{Job, JobId, Transition};

/// The work behind each step, and the payload of a finished job.
#[async_trait]
pub trait StepWorker: Send + Sync {
    /// Execute `step` for `job`. An error fails the job; later steps do not run.
    async fn run_step(&self, job: &Job, step: &Step) -> std::result::Result<(), StepError>;

    /// Produce the result payload once every step has succeeded.
    async fn finish(&self, job: &Job) -> std::result::Result<Value, StepError>;
}

/// Notified after each applied step and once at the terminal transition.
pub trait StepObserver: Send + Sync {
    fn on_step(&self, job: &Job, step: &Step);
    fn on_finish(&self, job: &Job);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_step(&self, _job: &Job, _step: &Step) {}
    fn on_finish(&self, _job: &Job) {}
}

/// Timing policy applied to every step's configured duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    scale: f64,
}

impl Pacing {
    /// `scale` multiplies each step duration. `0.0` runs steps back to back.
    pub fn new(scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(JobError::InvalidArgument(format!(
                "time scale must be a non-negative number, got {scale}"
            )));
        }
        Ok(Self { scale })
    }

    pub fn realtime() -> Self {
        Self { scale: 1.0 }
    }

    pub fn instant() -> Self {
        Self { scale: 0.0 }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Saturates at [`Duration::MAX`] instead of overflowing.
    pub fn scaled(&self, duration: Duration) -> Duration {
        Duration::try_from_secs_f64(duration.as_secs_f64() * self.scale).unwrap_or(Duration::MAX)
    }

    async fn wait(&self, duration: Duration) {
        let duration = self.scaled(duration);
        if duration.is_zero() {
            // Still a suspension point, so cancellation and other jobs get a turn.
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(duration).await;
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::realtime()
    }
}

/// Why a run stopped before completing.
enum Halt {
    Failed(StepFailure),
    Registry(JobError),
}

impl From<StepFailure> for Halt {
    fn from(failure: StepFailure) -> Self {
        Halt::Failed(failure)
    }
}

impl From<JobError> for Halt {
    fn from(err: JobError) -> Self {
        Halt::Registry(err)
    }
}

pub struct StepSequencer {
    registry: Arc<JobRegistry>,
    worker: Arc<dyn StepWorker>,
    pacing: Pacing,
    deadline: Option<Duration>,
}

impl StepSequencer {
    pub fn new(registry: Arc<JobRegistry>, worker: Arc<dyn StepWorker>) -> Self {
        Self {
            registry,
            worker,
            pacing: Pacing::default(),
            deadline: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Fail jobs that have not finished within `deadline` of starting.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run job `id` through `plan` to a terminal status.
    ///
    /// Step failures, cancellation and deadline expiry are recorded on the
    /// job and returned as a `failed` snapshot, not as an error. Errors are
    /// reserved for jobs that cannot be run at all: unknown ids, and jobs
    /// that already left `pending` ([`JobError::InvalidState`]).
    pub async fn run(
        &self,
        id: JobId,
        plan: &StepPlan,
        cancel: &CancellationToken,
        observer: &dyn StepObserver,
    ) -> Result<Job> {
        let job = match self.registry.update(id, Transition::Start) {
            Ok(job) => job,
            Err(JobError::InvalidTransition { status, .. }) => {
                return Err(JobError::InvalidState {
                    id,
                    reason: format!("job is already {status}"),
                });
            }
            Err(e) => return Err(e),
        };

        let started = Instant::now();
        // A deadline too far out to represent is no deadline at all.
        let expires_at = self.deadline.and_then(|d| started.checked_add(d));
        tracing::debug!(steps = plan.len(), "job running");

        let terminal = match self.drive(job, plan, cancel, expires_at, observer).await {
            Ok(result) => Transition::Complete { result },
            Err(Halt::Failed(failure)) => {
                tracing::warn!(error = %failure, "job failed");
                Transition::Fail {
                    error: failure.to_string(),
                }
            }
            Err(Halt::Registry(err)) => {
                tracing::error!(error = %err, "registry rejected step update");
                if let Ok(job) = self.registry.update(
                    id,
                    Transition::Fail {
                        error: err.to_string(),
                    },
                ) {
                    crate::metrics::record_finished(job.kind, job.status, started.elapsed());
                    observer.on_finish(&job);
                }
                return Err(err);
            }
        };

        let job = self.registry.update(id, terminal)?;
        crate::metrics::record_finished(job.kind, job.status, started.elapsed());
        tracing::info!(
            status = %job.status,
            progress = job.progress,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "job finished"
        );
        observer.on_finish(&job);
        Ok(job)
    }

    async fn drive(
        &self,
        mut job: Job,
        plan: &StepPlan,
        cancel: &CancellationToken,
        expires_at: Option<Instant>,
        observer: &dyn StepObserver,
    ) -> std::result::Result<Value, Halt> {
        for (index, step) in plan.steps().iter().enumerate() {
            let work = async {
                self.pacing.wait(step.duration).await;
                contained(self.worker.run_step(&job, step)).await
            };
            guarded(work, cancel, expires_at)
                .await?
                .map_err(|source| StepFailure::Step {
                    label: step.label.clone(),
                    source,
                })?;

            job = self.registry.update(
                job.id,
                Transition::Advance {
                    step_index: index as i32,
                    progress: step.target_progress,
                    label: step.label.clone(),
                },
            )?;
            tracing::debug!(step = %step.label, progress = job.progress, "step applied");
            observer.on_step(&job, step);
        }

        let result = guarded(contained(self.worker.finish(&job)), cancel, expires_at)
            .await?
            .map_err(StepFailure::Result)?;
        Ok(result)
    }
}

/// Turn a panicking worker future into a step error.
async fn contained<F, T>(work: F) -> std::result::Result<T, StepError>
where
    F: Future<Output = std::result::Result<T, StepError>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(output) => output,
        Err(panic) => Err(StepError::new(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    match panic
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
    {
        Some(msg) => format!("step panicked: {msg}"),
        None => "step panicked".to_string(),
    }
}

/// Race `work` against cancellation and the deadline.
async fn guarded<F: Future>(
    work: F,
    cancel: &CancellationToken,
    expires_at: Option<Instant>,
) -> std::result::Result<F::Output, StepFailure> {
    let expiry = async {
        match expires_at {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StepFailure::Cancelled),
        _ = expiry => Err(StepFailure::DeadlineExceeded),
        output = work => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobKind, JobStatus, ResourceId};
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        fail_at: Option<&'static str>,
        panic_at: Option<&'static str>,
    }

    #[async_trait]
    impl StepWorker for Scripted {
        async fn run_step(&self, _job: &Job, step: &Step) -> std::result::Result<(), StepError> {
            if self.panic_at == Some(step.label.as_str()) {
                panic!("worker bug");
            }
            match self.fail_at {
                Some(label) if label == step.label => Err(StepError::new("boom")),
                _ => Ok(()),
            }
        }

        async fn finish(&self, _job: &Job) -> std::result::Result<Value, StepError> {
            if self.panic_at == Some("finish") {
                panic!("{}", String::from("no result"));
            }
            Ok(json!({"ok": true}))
        }
    }

    #[derive(Default)]
    struct Recorder {
        steps: Mutex<Vec<(i32, u8)>>,
        finished: Mutex<Vec<JobStatus>>,
    }

    impl StepObserver for Recorder {
        fn on_step(&self, job: &Job, _step: &Step) {
            self.steps
                .lock()
                .unwrap()
                .push((job.current_step_index, job.progress));
        }

        fn on_finish(&self, job: &Job) {
            self.finished.lock().unwrap().push(job.status);
        }
    }

    fn plan() -> StepPlan {
        StepPlan::uniform(
            &[("a", "A", 50), ("b", "B", 100)],
            Duration::from_millis(100),
        )
        .unwrap()
    }

    fn setup(fail_at: Option<&'static str>) -> (Arc<JobRegistry>, StepSequencer, JobId) {
        setup_worker(Scripted {
            fail_at,
            panic_at: None,
        })
    }

    fn setup_worker(worker: Scripted) -> (Arc<JobRegistry>, StepSequencer, JobId) {
        let registry = Arc::new(JobRegistry::default());
        let job = registry
            .create(ResourceId::new("p").unwrap(), JobKind::Build, json!({}))
            .unwrap();
        let sequencer = StepSequencer::new(Arc::clone(&registry), Arc::new(worker));
        (registry, sequencer, job.id)
    }

    #[test]
    fn test_pacing_rejects_bad_scale() {
        assert!(Pacing::new(-1.0).is_err());
        assert!(Pacing::new(f64::NAN).is_err());
        assert_eq!(
            Pacing::new(0.5).unwrap().scaled(Duration::from_secs(2)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_pacing_saturates_huge_scale() {
        let pacing = Pacing::new(1e300).unwrap();
        assert_eq!(pacing.scaled(Duration::from_secs(1)), Duration::MAX);
        assert_eq!(pacing.scaled(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_to_completion() {
        let (_, sequencer, id) = setup(None);
        let recorder = Recorder::default();
        let job = sequencer
            .run(id, &plan(), &CancellationToken::new(), &recorder)
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(json!({"ok": true})));
        assert_eq!(*recorder.steps.lock().unwrap(), vec![(0, 50), (1, 100)]);
        assert_eq!(*recorder.finished.lock().unwrap(), vec![JobStatus::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_failure_stops_run() {
        let (_, sequencer, id) = setup(Some("b"));
        let recorder = Recorder::default();
        let job = sequencer
            .run(id, &plan(), &CancellationToken::new(), &recorder)
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.current_step_index, 0);
        assert_eq!(job.progress, 50);
        assert_eq!(job.error.as_deref(), Some("step 'b' failed: boom"));
        assert_eq!(*recorder.steps.lock().unwrap(), vec![(0, 50)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_is_invalid_state() {
        let (_, sequencer, id) = setup(None);
        sequencer
            .run(id, &plan(), &CancellationToken::new(), &NoopObserver)
            .await
            .unwrap();
        let err = sequencer
            .run(id, &plan(), &CancellationToken::new(), &NoopObserver)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidState { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_token_fails_before_first_step() {
        let (_, sequencer, id) = setup(None);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let job = sequencer.run(id, &plan(), &cancel, &NoopObserver).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("cancelled"));
        assert_eq!(job.current_step_index, -1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires_mid_run() {
        let (_, sequencer, id) = setup(None);
        let sequencer = sequencer.with_deadline(Some(Duration::from_millis(150)));
        let job = sequencer
            .run(id, &plan(), &CancellationToken::new(), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("deadline exceeded"));
        assert_eq!(job.progress, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_deadline_is_ignored() {
        let (_, sequencer, id) = setup(None);
        let sequencer = sequencer.with_deadline(Some(Duration::MAX));
        let job = sequencer
            .run(id, &plan(), &CancellationToken::new(), &NoopObserver)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_step_fails_job() {
        let (registry, sequencer, id) = setup_worker(Scripted {
            fail_at: None,
            panic_at: Some("b"),
        });
        let recorder = Recorder::default();
        let job = sequencer
            .run(id, &plan(), &CancellationToken::new(), &recorder)
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 50);
        assert_eq!(
            job.error.as_deref(),
            Some("step 'b' failed: step panicked: worker bug")
        );
        assert_eq!(*recorder.finished.lock().unwrap(), vec![JobStatus::Failed]);
        assert_eq!(registry.get(id).unwrap().status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_finish_fails_job() {
        let (_, sequencer, id) = setup_worker(Scripted {
            fail_at: None,
            panic_at: Some("finish"),
        });
        let job = sequencer
            .run(id, &plan(), &CancellationToken::new(), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some("result generation failed: step panicked: no result")
        );
    }
}
