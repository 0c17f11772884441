use std::fmt;
use serde::Serialize;
use super::types::{JobStatus, JobStep, PipelineJob};

pub struct StepDefinition {
    pub step: JobStep,
    pub label: &'static str,
    pub description: &'static str,
    pub status_before: JobStatus,
    pub status_after: JobStatus,
}

/// The five user-facing steps, in order.
pub static PIPELINE_STEPS: &[StepDefinition] = &[
    StepDefinition {
        step: JobStep::Upload,
        label: "Upload",
        description: "Upload source documents",
        status_before: JobStatus::Created,
        status_after: JobStatus::Uploaded,
    },
    StepDefinition {
        step: JobStep::Extract,
        label: "Extract",
        description: "Extract structured data",
        status_before: JobStatus::Uploaded,
        status_after: JobStatus::Extracted,
    },
    StepDefinition {
        step: JobStep::Map,
        label: "Map",
        description: "Map fields to schema",
        status_before: JobStatus::Extracted,
        status_after: JobStatus::Mapped,
    },
    StepDefinition {
        step: JobStep::Transform,
        label: "Transform",
        description: "Transform & validate",
        status_before: JobStatus::Mapped,
        status_after: JobStatus::Validated,
    },
    StepDefinition {
        step: JobStep::Export,
        label: "Export",
        description: "Export CSV files",
        status_before: JobStatus::Validated,
        status_after: JobStatus::Completed,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Error,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Coarse user-facing step for a backend status. A failed job reports
/// `Upload` because the status alone does not say where it failed.
pub fn current_step_from_status(status: JobStatus) -> JobStep {
    match status {
        JobStatus::Created | JobStatus::Uploading => JobStep::Upload,
        JobStatus::Uploaded | JobStatus::Extracting => JobStep::Extract,
        JobStatus::Extracted | JobStatus::Mapping => JobStep::Map,
        JobStatus::Mapped | JobStatus::Transforming | JobStatus::Transformed | JobStatus::Validating => {
            JobStep::Transform
        }
        JobStatus::Validated | JobStatus::Exporting | JobStatus::Completed => JobStep::Export,
        JobStatus::Failed => JobStep::Upload,
    }
}

/// Status a job must have reached for `step` to count as done.
fn completion_milestone(step: JobStep) -> JobStatus {
    match step {
        JobStep::Upload => JobStatus::Uploaded,
        JobStep::Extract => JobStatus::Extracted,
        JobStep::Map => JobStatus::Mapped,
        JobStep::Transform => JobStatus::Transformed,
        JobStep::Validate => JobStatus::Validated,
        JobStep::Export => JobStatus::Completed,
    }
}

pub fn is_step_completed(status: JobStatus, step: JobStep) -> bool {
    match (status.rank(), completion_milestone(step).rank()) {
        (Some(current), Some(milestone)) => current >= milestone,
        _ => false,
    }
}

/// `Validate` is shown as part of `Transform`.
fn display_step(step: JobStep) -> JobStep {
    match step {
        JobStep::Validate => JobStep::Transform,
        other => other,
    }
}

fn display_position(step: JobStep) -> usize {
    let step = display_step(step);
    PIPELINE_STEPS.iter().position(|s| s.step == step).unwrap_or(0)
}

pub fn step_status(status: JobStatus, step: JobStep) -> StepStatus {
    step_status_at(status, None, &[], step)
}

/// Like [`step_status`], but a failed job is attributed to the step the
/// record says it was on, and steps it lists as done stay completed.
pub fn step_status_for_job(job: &PipelineJob, step: JobStep) -> StepStatus {
    step_status_at(job.status, job.current_step, &job.steps_completed, step)
}

fn step_status_at(status: JobStatus, recorded: Option<JobStep>, done: &[JobStep], step: JobStep) -> StepStatus {
    let current = match (status, recorded) {
        (JobStatus::Failed, Some(recorded)) => display_step(recorded),
        _ => current_step_from_status(status),
    };
    if status == JobStatus::Failed && current == display_step(step) {
        return StepStatus::Error;
    }
    if is_step_completed(status, step) || done.contains(&step) {
        return StepStatus::Completed;
    }
    if current == display_step(step) {
        return StepStatus::Active;
    }
    StepStatus::Pending
}

/// With no job only upload is reachable; otherwise at most one step past
/// the current one.
pub fn can_proceed_to_step(status: Option<JobStatus>, step: JobStep) -> bool {
    match status {
        None => step == JobStep::Upload,
        Some(status) => display_position(step) <= display_position(current_step_from_status(status)) + 1,
    }
}
