// crates/jobs/src/metrics.rs
//! Job metrics, recorded through the `metrics` facade.
//!
//! Recording is a no-op until a global recorder is installed; the server
//! installs the Prometheus exporter at startup and calls [`describe_metrics`].

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::types::{JobKind, JobStatus};

/// Describe all job metrics for the installed recorder.
pub fn describe_metrics() {
    describe_counter!("jobs_started_total", "Jobs accepted by the job service");
    describe_counter!(
        "jobs_finished_total",
        "Jobs that reached a terminal status, by kind and status"
    );
    describe_histogram!(
        "job_duration_seconds",
        "Wall time from job start to its terminal transition"
    );
    describe_counter!(
        "job_events_published_total",
        "Job events handed to the subscription router"
    );
    describe_counter!(
        "job_event_deliveries_total",
        "Successful per-subscriber event deliveries"
    );
}

pub(crate) fn record_started(kind: JobKind) {
    counter!("jobs_started_total", "kind" => kind.as_str()).increment(1);
}

pub(crate) fn record_finished(kind: JobKind, status: JobStatus, elapsed: Duration) {
    counter!("jobs_finished_total", "kind" => kind.as_str(), "status" => status.as_str())
        .increment(1);
    histogram!("job_duration_seconds", "kind" => kind.as_str()).record(elapsed.as_secs_f64());
}

pub(crate) fn record_publish(kind: JobKind, delivered: usize) {
    counter!("job_events_published_total", "kind" => kind.as_str()).increment(1);
    counter!("job_event_deliveries_total", "kind" => kind.as_str()).increment(delivered as u64);
}
