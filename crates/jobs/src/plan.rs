// crates/jobs/src/plan.rs
//! Step plans: the ordered progress milestones a job follows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::{JobError, Result};
use crate::types::JobKind;

/// Base delay between steps of the simulated workloads.
pub const DEFAULT_STEP_DURATION: Duration = Duration::from_secs(2);

/// One named milestone of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub label: String,
    pub message: String,
    pub target_progress: u8,
    #[serde(skip)]
    pub duration: Duration,
}

impl Step {
    pub fn new(
        label: impl Into<String>,
        message: impl Into<String>,
        target_progress: u8,
        duration: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            message: message.into(),
            target_progress,
            duration,
        }
    }
}

/// A validated, non-empty, strictly increasing sequence of steps ending at 100%.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    steps: Arc<[Step]>,
}

impl StepPlan {
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        let Some(last) = steps.last() else {
            return Err(JobError::InvalidPlan("plan has no steps".into()));
        };
        if last.target_progress != 100 {
            return Err(JobError::InvalidPlan(format!(
                "final step '{}' targets {}%, expected 100%",
                last.label, last.target_progress
            )));
        }

        let mut previous = 0u8;
        for step in &steps {
            if step.target_progress <= previous {
                return Err(JobError::InvalidPlan(format!(
                    "step '{}' targets {}%, which does not exceed {}%",
                    step.label, step.target_progress, previous
                )));
            }
            previous = step.target_progress;
        }

        Ok(Self {
            steps: steps.into(),
        })
    }

    /// Build a plan from `(label, message, target)` rows sharing one duration.
    pub fn uniform(rows: &[(&str, &str, u8)], duration: Duration) -> Result<Self> {
        Self::new(
            rows.iter()
                .map(|(label, message, target)| Step::new(*label, *message, *target, duration))
                .collect(),
        )
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of every step's configured duration.
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }
}

const AI_GENERATION_STEPS: &[(&str, &str, u8)] = &[
    ("initializing_agent", "Initializing AI agent...", 20),
    ("processing_prompt", "Processing prompt...", 40),
    ("generating_content", "Generating content...", 60),
    ("refining_output", "Refining output...", 80),
    ("finalizing", "Generation completed!", 100),
];

const PROJECT_GENERATION_STEPS: &[(&str, &str, u8)] = &[
    ("analyzing_prompt", "Analyzing game concept...", 10),
    ("generating_assets", "Generating game assets...", 30),
    ("creating_code", "Writing game code...", 50),
    ("building_levels", "Designing levels...", 70),
    ("optimizing", "Optimizing performance...", 90),
    ("finalizing", "Game generation completed!", 100),
];

const BUILD_STEPS: &[(&str, &str, u8)] = &[
    ("preparing", "Preparing build environment...", 15),
    ("compiling", "Compiling game code...", 45),
    ("bundling_assets", "Bundling assets...", 70),
    ("packaging", "Packaging platform builds...", 90),
    ("publishing", "Build artifacts ready!", 100),
];

/// Per-kind plan lookup.
#[derive(Debug, Clone)]
pub struct PlanBook {
    plans: HashMap<JobKind, StepPlan>,
}

impl PlanBook {
    /// The built-in plans, every step lasting `step_duration`.
    pub fn standard(step_duration: Duration) -> Self {
        let mut plans = HashMap::new();
        for kind in JobKind::ALL {
            let rows = match kind {
                JobKind::AiGeneration => AI_GENERATION_STEPS,
                JobKind::ProjectGeneration => PROJECT_GENERATION_STEPS,
                JobKind::Build => BUILD_STEPS,
            };
            // Built-in tables are strictly increasing and end at 100.
            if let Ok(plan) = StepPlan::uniform(rows, step_duration) {
                plans.insert(kind, plan);
            }
        }
        Self { plans }
    }

    /// Replace the plan used for `kind`.
    pub fn with_plan(mut self, kind: JobKind, plan: StepPlan) -> Self {
        self.plans.insert(kind, plan);
        self
    }

    pub fn plan_for(&self, kind: JobKind) -> Result<StepPlan> {
        self.plans
            .get(&kind)
            .cloned()
            .ok_or_else(|| JobError::InvalidPlan(format!("no plan registered for {kind}")))
    }
}

impl Default for PlanBook {
    fn default() -> Self {
        Self::standard(DEFAULT_STEP_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(label: &str, target: u8) -> Step {
        Step::new(label, label, target, Duration::from_millis(10))
    }

    #[test]
    fn test_plan_rejects_empty() {
        assert!(matches!(StepPlan::new(vec![]), Err(JobError::InvalidPlan(_))));
    }

    #[test]
    fn test_plan_rejects_non_increasing() {
        let err = StepPlan::new(vec![step("a", 50), step("b", 50), step("c", 100)]);
        assert!(err.is_err());
        let err = StepPlan::new(vec![step("a", 60), step("b", 40), step("c", 100)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_plan_rejects_zero_target() {
        assert!(StepPlan::new(vec![step("a", 0), step("b", 100)]).is_err());
    }

    #[test]
    fn test_plan_must_end_at_100() {
        assert!(StepPlan::new(vec![step("a", 50), step("b", 90)]).is_err());
        assert!(StepPlan::new(vec![step("a", 50), step("b", 100)]).is_ok());
    }

    #[test]
    fn test_standard_book_covers_every_kind() {
        let book = PlanBook::standard(Duration::from_secs(2));
        for kind in JobKind::ALL {
            let plan = book.plan_for(kind).unwrap();
            assert!(!plan.is_empty());
            assert_eq!(plan.steps().last().unwrap().target_progress, 100);
        }
        assert_eq!(book.plan_for(JobKind::AiGeneration).unwrap().len(), 5);
        assert_eq!(book.plan_for(JobKind::ProjectGeneration).unwrap().len(), 6);
        assert_eq!(
            book.plan_for(JobKind::ProjectGeneration)
                .unwrap()
                .total_duration(),
            Duration::from_secs(12)
        );
    }

    #[test]
    fn test_with_plan_overrides_kind() {
        let custom = StepPlan::new(vec![step("only", 100)]).unwrap();
        let book = PlanBook::default().with_plan(JobKind::Build, custom.clone());
        assert_eq!(book.plan_for(JobKind::Build).unwrap(), custom);
    }
}
