// crates/jobs/src/lib.rs
//! Long-running job tracking with resource-scoped progress broadcast.
//!
//! A job walks an ordered [`StepPlan`]; after every step its snapshot is
//! stored in the [`JobRegistry`] and published as a [`JobEvent`] to all
//! subscribers currently joined to the job's resource through the
//! [`SubscriptionRouter`]. [`JobService`] is the entry point.

pub mod catalog;
pub mod error;
pub mod event;
pub mod metrics;
pub mod plan;
pub mod registry;
pub mod router;
pub mod sequencer;
pub mod service;
pub mod simulate;
pub mod types;

pub use catalog::{Agent, AgentInfo, Platform};
pub use error::{JobError, Result, StepError, StepFailure};
pub use event::{JobEvent, JobEventKind, StepSummary};
pub use plan::{PlanBook, Step, StepPlan, DEFAULT_STEP_DURATION};
pub use registry::{ConcurrencyPolicy, JobFilter, JobRegistry};
pub use router::{DeliveryError, EventSink, Subscriber, SubscriberId, SubscriptionRouter};
pub use sequencer::{NoopObserver, Pacing, StepObserver, StepSequencer, StepWorker};
pub use service::{JobService, JobServiceConfig, NewJob, DEFAULT_RETENTION};
pub use simulate::{SimulatedWorker, DEFAULT_PREVIEW_BASE_URL};
pub use types::{Job, JobId, JobKind, JobStatus, ResourceId, Transition, MAX_RESOURCE_ID_LEN};
