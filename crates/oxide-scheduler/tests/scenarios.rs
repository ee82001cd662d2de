//! End-to-end runs through the engine with scripted collaborators.

use async_trait::async_trait;
use oxide_cache::MemoryStore;
use oxide_core::Result;
use oxide_core::event::EventDescriptor;
use oxide_core::pipeline::{
    CacheStepConfig, MatrixAxis, PipelineDefinition, StepDefinition, StepKind, TriggerRule,
};
use oxide_core::run::{JobStatus, RunStatus};
use oxide_runner::{
    CommandExecutor, EnvironmentFactory, ShellRunner, StepContext, StepExecutor, WorkspaceLayout,
};
use oxide_scheduler::{JobScheduler, MatrixExpander, PipelineEngine};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns scripted exit codes keyed by `(platform, step)` and records every
/// call it receives.
#[derive(Default)]
struct ScriptedRunner {
    exit_codes: HashMap<(String, String), i32>,
    panic_on: Option<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedRunner {
    fn fail(mut self, platform: &str, step: &str, code: i32) -> Self {
        self.exit_codes
            .insert((platform.to_string(), step.to_string()), code);
        self
    }

    fn calls_for(&self, platform: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == platform)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedRunner {
    async fn execute(&self, ctx: &StepContext) -> Result<i32> {
        if self.panic_on.as_deref() == Some(ctx.platform.as_str()) {
            panic!("runner crashed on {}", ctx.platform);
        }
        self.calls
            .lock()
            .unwrap()
            .push((ctx.platform.clone(), ctx.step.name.clone()));
        Ok(*self
            .exit_codes
            .get(&(ctx.platform.clone(), ctx.step.name.clone()))
            .unwrap_or(&0))
    }
}

/// Sleeps on every step and tracks how many calls overlap.
#[derive(Default)]
struct SlowRunner {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl CommandExecutor for SlowRunner {
    async fn execute(&self, _ctx: &StepContext) -> Result<i32> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(0)
    }
}

fn ci_pipeline() -> PipelineDefinition {
    PipelineDefinition {
        name: "ci".to_string(),
        description: None,
        triggers: vec![
            TriggerRule::Manual,
            TriggerRule::Push {
                paths: vec!["src/".to_string()],
            },
            TriggerRule::PullRequest {
                branches: vec!["main".to_string()],
            },
        ],
        matrix: MatrixAxis::platforms(["linux", "windows", "macos"]),
        steps: vec![
            StepDefinition::new("checkout", StepKind::Checkout),
            StepDefinition::new("cache", StepKind::CacheRestore).with_cache(CacheStepConfig {
                key_inputs: vec!["0123abcd".to_string()],
                paths: vec!["target".to_string()],
                ..Default::default()
            }),
            StepDefinition::new("build", StepKind::Build).with_run("cargo build --verbose"),
            StepDefinition::new("test", StepKind::Test).with_run("cargo test --verbose"),
        ],
        max_concurrency: None,
        variables: BTreeMap::new(),
    }
}

fn engine(runner: Arc<dyn CommandExecutor>, workspace: &std::path::Path) -> PipelineEngine {
    engine_with_layout(runner, workspace, WorkspaceLayout::default())
}

fn engine_with_layout(
    runner: Arc<dyn CommandExecutor>,
    workspace: &std::path::Path,
    layout: WorkspaceLayout,
) -> PipelineEngine {
    let executor = StepExecutor::new(runner, Arc::new(MemoryStore::new()));
    let environments = EnvironmentFactory::new(workspace.to_path_buf(), layout);
    PipelineEngine::new(JobScheduler::new(Arc::new(executor), environments))
}

/// Platforms in the order each one first reached the runner.
fn start_order(runner: &ScriptedRunner) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    for (platform, _) in runner.calls.lock().unwrap().iter() {
        if !order.contains(platform) {
            order.push(platform.clone());
        }
    }
    order
}

#[tokio::test]
async fn test_push_run_with_windows_build_failure() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::default().fail("windows", "build", 1));
    let engine = engine(runner.clone(), workspace.path());

    let report = engine
        .handle_trigger(&ci_pipeline(), &EventDescriptor::push(["src/lib.rs"]))
        .await
        .unwrap()
        .expect("push to src/ should trigger");

    assert_eq!(report.jobs.len(), 3);
    let platforms: Vec<&str> = report.jobs.iter().map(|j| j.platform.as_str()).collect();
    assert_eq!(platforms, vec!["linux", "windows", "macos"]);
    for job in &report.jobs {
        assert_eq!(job.steps.len(), 4);
    }

    assert_eq!(report.job("linux").unwrap().status, JobStatus::Succeeded);
    assert_eq!(report.job("macos").unwrap().status, JobStatus::Succeeded);

    let windows = report.job("windows").unwrap();
    assert_eq!(windows.status, JobStatus::Failed);
    assert_eq!(windows.step("build").unwrap().exit_code, 1);
    assert!(windows.step("test").unwrap().skipped);
    assert_eq!(runner.calls_for("windows"), vec!["checkout", "build"]);

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.succeeded_count(), 2);
    assert_eq!(report.failed_count(), 1);
}

#[tokio::test]
async fn test_pull_request_to_unconfigured_branch_does_not_run() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::default());
    let engine = engine(runner.clone(), workspace.path());

    let report = engine
        .handle_trigger(&ci_pipeline(), &EventDescriptor::pull_request("feature-x"))
        .await
        .unwrap();

    assert!(report.is_none());
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_run_succeeds_on_every_platform() {
    let workspace = tempfile::tempdir().unwrap();
    let engine = engine(Arc::new(ScriptedRunner::default()), workspace.path());

    let report = engine
        .handle_trigger(&ci_pipeline(), &EventDescriptor::manual())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.pipeline_name, "ci");
    assert!(report.jobs.iter().all(|j| j.variables["platform"] == j.platform));
}

#[tokio::test]
async fn test_invalid_template_fails_before_any_job() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::default());
    let engine = engine(runner.clone(), workspace.path());

    let mut definition = ci_pipeline();
    definition.matrix = MatrixAxis::platforms(Vec::<String>::new());

    let err = engine
        .handle_trigger(&definition, &EventDescriptor::manual())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = Arc::new(SlowRunner::default());
    let engine = engine(runner.clone(), workspace.path());

    let mut definition = ci_pipeline();
    definition.matrix = MatrixAxis::platforms(["a", "b", "c", "d", "e"]);
    definition.max_concurrency = Some(2);

    let report = engine
        .handle_trigger(&definition, &EventDescriptor::manual())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.jobs.len(), 5);
    assert!(runner.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_jobs_start_in_declaration_order() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::default());
    let engine = engine(runner.clone(), workspace.path());

    let mut definition = ci_pipeline();
    definition.matrix = MatrixAxis::platforms(["ubuntu", "macos", "windows", "freebsd", "alpine"]);
    definition.max_concurrency = Some(1);

    let report = engine
        .handle_trigger(&definition, &EventDescriptor::manual())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(
        start_order(&runner),
        vec!["ubuntu", "macos", "windows", "freebsd", "alpine"]
    );
}

#[tokio::test]
async fn test_parallel_jobs_do_not_see_each_others_files() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::write(workspace.path().join("Cargo.toml"), "[package]\n").unwrap();
    let engine = engine(Arc::new(ShellRunner::default()), workspace.path());

    let mut definition = ci_pipeline();
    definition.steps = vec![
        StepDefinition::new("seeded", StepKind::Checkout).with_run("test -f Cargo.toml"),
        StepDefinition::new("mark", StepKind::Build)
            .with_run("touch marker-$OXIDE_PLATFORM && sleep 0.3"),
        StepDefinition::new("alone", StepKind::Test)
            .with_run("test $(ls marker-* | wc -l) -eq 1"),
    ];

    let report = engine
        .handle_trigger(&definition, &EventDescriptor::manual())
        .await
        .unwrap()
        .unwrap();

    for job in &report.jobs {
        assert_eq!(job.status, JobStatus::Succeeded, "{} failed", job.platform);
    }
    assert_eq!(report.status, RunStatus::Succeeded);
    assert!(std::fs::read_dir(workspace.path())
        .unwrap()
        .all(|e| !e.unwrap().file_name().to_string_lossy().starts_with("marker-")));
}

#[tokio::test]
async fn test_shared_layout_runs_one_job_at_a_time() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = Arc::new(SlowRunner::default());
    let engine = engine_with_layout(runner.clone(), workspace.path(), WorkspaceLayout::Shared);

    let report = engine
        .handle_trigger(&ci_pipeline(), &EventDescriptor::manual())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(runner.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failures_do_not_abort_other_jobs() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = Arc::new(
        ScriptedRunner::default()
            .fail("linux", "checkout", 128)
            .fail("windows", "test", 1),
    );
    let engine = engine(runner.clone(), workspace.path());

    let report = engine
        .handle_trigger(&ci_pipeline(), &EventDescriptor::manual())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.failed_count(), 2);
    assert_eq!(report.job("macos").unwrap().status, JobStatus::Succeeded);
    assert_eq!(runner.calls_for("macos"), vec!["checkout", "build", "test"]);
}

#[tokio::test]
async fn test_crashed_job_is_reported_failed() {
    let workspace = tempfile::tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner {
        panic_on: Some("windows".to_string()),
        ..Default::default()
    });
    let executor = StepExecutor::new(runner, Arc::new(MemoryStore::new()));
    let scheduler = JobScheduler::new(
        Arc::new(executor),
        EnvironmentFactory::new(workspace.path().to_path_buf(), WorkspaceLayout::PerJob),
    );

    let jobs = MatrixExpander::new()
        .expand(&MatrixAxis::platforms(["linux", "windows", "macos"]))
        .unwrap();
    let report = scheduler
        .run_all("ci", jobs, ci_pipeline().steps.into(), None)
        .await;

    assert_eq!(report.jobs.len(), 3);
    assert_eq!(report.jobs[1].platform, "windows");
    assert_eq!(report.jobs[1].status, JobStatus::Failed);
    assert_eq!(report.job("linux").unwrap().status, JobStatus::Succeeded);
    assert_eq!(report.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_repeated_runs_fail_at_the_same_step() {
    let pipeline = ci_pipeline();
    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let workspace = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::default().fail("macos", "build", 2));
        let report = engine(runner, workspace.path())
            .handle_trigger(&pipeline, &EventDescriptor::manual())
            .await
            .unwrap()
            .unwrap();
        let shape: Vec<(String, Vec<(String, i32, bool)>)> = report
            .jobs
            .iter()
            .map(|job| {
                (
                    job.platform.clone(),
                    job.steps
                        .iter()
                        .map(|s| (s.step_name.clone(), s.exit_code, s.skipped))
                        .collect(),
                )
            })
            .collect();
        outcomes.push(shape);
    }
    assert_eq!(outcomes[0], outcomes[1]);
}
