//! Serialization tests for oxide-core types.

use chrono::Utc;
use oxide_core::event::*;
use oxide_core::ids::*;
use oxide_core::pipeline::*;
use oxide_core::run::*;
use pretty_assertions::assert_eq;

#[test]
fn test_run_report_json_shape() {
    let mut linux = Job::new(0, "linux");
    linux.transition(JobStatus::Running).unwrap();
    linux.record(StepResult::completed("checkout", 0, 3));
    linux.record(StepResult::cache_restore("cache", "linux-cargo-00ff".to_string(), true, 1));
    linux.transition(JobStatus::Succeeded).unwrap();

    let report = RunReport::from_jobs(RunId::new(), "ci", vec![linux], Utc::now());
    let json = serde_json::to_value(&report).expect("serialize");

    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["jobs"][0]["platform"], "linux");
    assert_eq!(json["jobs"][0]["status"], "succeeded");
    assert_eq!(json["jobs"][0]["steps"][1]["cache_hit"], true);
    assert_eq!(json["jobs"][0]["steps"][1]["cache_key"], "linux-cargo-00ff");
    assert!(json["jobs"][0]["steps"][0].get("cache_key").is_none());
}

#[test]
fn test_run_report_roundtrip() {
    let mut job = Job::new(0, "macos");
    job.transition(JobStatus::Running).unwrap();
    job.record(StepResult::completed("build", 1, 10));
    job.record(StepResult::skipped("test"));
    job.transition(JobStatus::Failed).unwrap();

    let report = RunReport::from_jobs(RunId::new(), "ci", vec![job], Utc::now());
    let json = serde_json::to_string(&report).expect("serialize");
    let parsed: RunReport = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(parsed.run_id, report.run_id);
    assert_eq!(parsed.status, RunStatus::Failed);
    assert_eq!(parsed.jobs[0].steps, report.jobs[0].steps);
}

#[test]
fn test_event_descriptor_yaml() {
    let event: EventDescriptor =
        serde_yaml::from_str("kind: push\nchanged_paths: [src/lib.rs, README.md]\n")
            .expect("deserialize");
    assert_eq!(event, EventDescriptor::push(["README.md", "src/lib.rs"]));
}

#[test]
fn test_trigger_rules_yaml_roundtrip() {
    let rules = vec![
        TriggerRule::Manual,
        TriggerRule::Push {
            paths: vec!["src/".to_string()],
        },
        TriggerRule::PullRequest {
            branches: vec!["main".to_string()],
        },
    ];
    let yaml = serde_yaml::to_string(&rules).expect("serialize");
    assert!(yaml.contains("type: pull_request"));
    let parsed: Vec<TriggerRule> = serde_yaml::from_str(&yaml).expect("deserialize");
    assert_eq!(parsed, rules);
}

#[test]
fn test_pipeline_schema_mentions_steps() {
    let schema = schemars::schema_for!(PipelineDefinition);
    let json = serde_json::to_string(&schema).expect("serialize schema");
    assert!(json.contains("\"steps\""));
    assert!(json.contains("cache_restore"));
}
