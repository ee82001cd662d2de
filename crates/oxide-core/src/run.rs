//! Job, step-result and run-report types.

use crate::ids::{JobId, RunId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of one step within one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub exit_code: i32,
    /// True when a prior step in the same job failed and this one never ran.
    pub skipped: bool,
    /// Only meaningful for cache-restore steps.
    pub cache_hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn completed(step_name: impl Into<String>, exit_code: i32, duration_ms: u64) -> Self {
        Self {
            step_name: step_name.into(),
            exit_code,
            skipped: false,
            cache_hit: false,
            cache_key: None,
            duration_ms,
        }
    }

    pub fn skipped(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            exit_code: 0,
            skipped: true,
            cache_hit: false,
            cache_key: None,
            duration_ms: 0,
        }
    }

    pub fn cache_restore(
        step_name: impl Into<String>,
        key: String,
        hit: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            exit_code: 0,
            skipped: false,
            cache_hit: hit,
            cache_key: Some(key),
            duration_ms,
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.skipped && self.exit_code != 0
    }

    /// `Err(StepFailed)` when the step ran and exited non-zero.
    pub fn check(&self) -> Result<()> {
        if self.is_failure() {
            return Err(Error::StepFailed {
                exit_code: self.exit_code,
                message: format!("step '{}' failed", self.step_name),
            });
        }
        Ok(())
    }
}

/// One instantiation of the step pipeline bound to one matrix value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Position in the matrix axis.
    pub index: usize,
    pub platform: String,
    /// Pipeline variables overlaid with the matrix variable `{axis name: value}`.
    pub variables: BTreeMap<String, String>,
    pub status: JobStatus,
    pub steps: Vec<StepResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(index: usize, platform: impl Into<String>) -> Self {
        Self {
            id: JobId::new(),
            index,
            platform: platform.into(),
            variables: BTreeMap::new(),
            status: JobStatus::Pending,
            steps: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        match next {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            JobStatus::Succeeded | JobStatus::Failed => self.completed_at = Some(Utc::now()),
            JobStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn record(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_name == name)
    }

    /// First step that ran and exited non-zero.
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.is_failure())
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Succeeded)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        })
    }
}

/// Aggregate outcome of every job in one triggered execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub pipeline_name: String,
    pub status: RunStatus,
    /// Jobs in matrix-declaration order.
    pub jobs: Vec<Job>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Build a report; the overall status is succeeded iff every job
    /// succeeded.
    pub fn from_jobs(
        run_id: RunId,
        pipeline_name: impl Into<String>,
        mut jobs: Vec<Job>,
        started_at: DateTime<Utc>,
    ) -> Self {
        jobs.sort_by_key(|job| job.index);
        let status = if jobs.iter().all(|job| job.status == JobStatus::Succeeded) {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        let completed_at = Utc::now();
        Self {
            run_id,
            pipeline_name: pipeline_name.into(),
            status,
            jobs,
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0) as u64,
        }
    }

    pub fn job(&self, platform: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.platform == platform)
    }

    pub fn succeeded_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Succeeded)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.jobs.len() - self.succeeded_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle() {
        let mut job = Job::new(0, "linux");
        assert_eq!(job.status, JobStatus::Pending);
        job.transition(JobStatus::Running).unwrap();
        assert!(job.started_at.is_some());
        job.transition(JobStatus::Succeeded).unwrap();
        assert!(job.status.is_terminal());
        assert!(job.duration_ms().is_some());
    }

    #[test]
    fn test_terminal_state_has_no_reentry() {
        let mut job = Job::new(0, "linux");
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Failed).unwrap();
        assert!(matches!(
            job.transition(JobStatus::Running),
            Err(Error::InvalidTransition { .. })
        ));
        assert!(job.transition(JobStatus::Succeeded).is_err());
    }

    #[test]
    fn test_pending_cannot_finish_directly() {
        let mut job = Job::new(0, "linux");
        assert!(job.transition(JobStatus::Succeeded).is_err());
    }

    #[test]
    fn test_skipped_step_is_not_a_failure() {
        assert!(!StepResult::skipped("test").is_failure());
        assert!(StepResult::completed("build", 1, 5).is_failure());
        assert!(StepResult::skipped("test").check().is_ok());
        assert!(matches!(
            StepResult::completed("build", 2, 5).check(),
            Err(Error::StepFailed { exit_code: 2, .. })
        ));
    }

    #[test]
    fn test_report_status_and_ordering() {
        let mut a = Job::new(1, "windows");
        a.transition(JobStatus::Running).unwrap();
        a.transition(JobStatus::Failed).unwrap();
        let mut b = Job::new(0, "linux");
        b.transition(JobStatus::Running).unwrap();
        b.transition(JobStatus::Succeeded).unwrap();

        let report = RunReport::from_jobs(RunId::new(), "ci", vec![a, b], Utc::now());
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.jobs[0].platform, "linux");
        assert_eq!(report.jobs[1].platform, "windows");
        assert_eq!(report.succeeded_count(), 1);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn test_report_of_succeeded_jobs_succeeds() {
        let mut job = Job::new(0, "linux");
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Succeeded).unwrap();
        let report = RunReport::from_jobs(RunId::new(), "ci", vec![job], Utc::now());
        assert!(report.status.is_success());
    }
}
