//! Bounded-concurrency job scheduling.

use chrono::Utc;
use oxide_core::ids::RunId;
use oxide_core::pipeline::StepDefinition;
use oxide_core::run::{Job, JobStatus, RunReport};
use oxide_runner::{EnvironmentFactory, StepExecutor, WorkspaceLayout};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};

/// Runs the jobs of one run, at most `max_concurrency` at a time.
///
/// Every job runs to completion regardless of how the others end; outcomes
/// are sent back over a channel and folded into a single [`RunReport`].
pub struct JobScheduler {
    executor: Arc<StepExecutor>,
    environments: EnvironmentFactory,
}

impl JobScheduler {
    pub fn new(executor: Arc<StepExecutor>, environments: EnvironmentFactory) -> Self {
        Self {
            executor,
            environments,
        }
    }

    /// Run every job and aggregate the outcomes.
    ///
    /// `max_concurrency` defaults to the number of jobs. Jobs start in
    /// declaration order as slots free up. A shared workspace forces one job
    /// at a time.
    pub async fn run_all(
        &self,
        pipeline_name: &str,
        jobs: Vec<Job>,
        steps: Arc<[StepDefinition]>,
        max_concurrency: Option<usize>,
    ) -> RunReport {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let total = jobs.len();
        let mut limit = max_concurrency.unwrap_or(total).max(1);
        if self.environments.layout() == WorkspaceLayout::Shared && limit > 1 {
            warn!(
                run_id = %run_id,
                requested = limit,
                "Shared workspace layout, running jobs one at a time"
            );
            limit = 1;
        }

        info!(
            run_id = %run_id,
            pipeline = %pipeline_name,
            jobs = total,
            max_concurrency = limit,
            "Starting run"
        );

        let semaphore = Arc::new(Semaphore::new(limit));
        // Sized so that finishing jobs never wait on the aggregator.
        let (tx, mut rx) = mpsc::channel::<Job>(total.max(1));
        let mut handles = Vec::with_capacity(total);

        for mut job in jobs {
            // Acquired here, not inside the task, so jobs start in declaration order.
            let permit = semaphore.clone().acquire_owned().await.ok();
            let executor = Arc::clone(&self.executor);
            let env = self.environments.create(&job.platform);
            let steps = Arc::clone(&steps);
            let tx = tx.clone();
            let placeholder = (job.index, job.platform.clone());

            debug!(run_id = %run_id, platform = %job.platform, "Dispatching job");
            let handle = tokio::spawn(async move {
                executor.run(&mut job, &steps, env.as_ref()).await;
                drop(permit);
                let _ = tx.send(job).await;
            });
            handles.push((placeholder, handle));
        }
        drop(tx);

        let mut finished = Vec::with_capacity(total);
        while let Some(job) = rx.recv().await {
            debug!(run_id = %run_id, platform = %job.platform, status = %job.status, "Job reported");
            finished.push(job);
        }

        let reported: HashSet<usize> = finished.iter().map(|job| job.index).collect();
        for ((index, platform), handle) in handles {
            if let Err(e) = handle.await {
                error!(run_id = %run_id, platform = %platform, error = %e, "Job task aborted");
            }
            if !reported.contains(&index) {
                finished.push(aborted_job(index, platform));
            }
        }

        let report = RunReport::from_jobs(run_id, pipeline_name, finished, started_at);
        info!(
            run_id = %report.run_id,
            status = %report.status,
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            duration_ms = report.duration_ms,
            "Run finished"
        );
        report
    }
}

/// Stand-in for a job whose task died before reporting back.
fn aborted_job(index: usize, platform: String) -> Job {
    let mut job = Job::new(index, platform);
    let _ = job.transition(JobStatus::Running);
    let _ = job.transition(JobStatus::Failed);
    job
}
