//! Run report rendering.

use crate::config::OutputFormat;
use console::style;
use oxide_core::pipeline::StepKind;
use oxide_core::run::{Job, JobStatus, RunReport, StepResult};
use std::fmt::Write;

/// Render a report in the requested format.
pub fn render(report: &RunReport, format: OutputFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        OutputFormat::Table => render_table(report),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
    })
}

pub fn render_table(report: &RunReport) -> String {
    let mut out = String::new();
    let width = report
        .jobs
        .iter()
        .map(|job| job.platform.len())
        .max()
        .unwrap_or(0);

    let _ = writeln!(
        out,
        "{} {} ({})",
        style("▶").cyan(),
        style(&report.pipeline_name).bold(),
        style(report.run_id).dim()
    );
    for job in &report.jobs {
        let _ = writeln!(
            out,
            "  {} {:<width$}  {:<9}  {:.2}s",
            job_marker(job),
            job.platform,
            job.status.to_string(),
            job.duration_ms().unwrap_or_default() as f64 / 1000.0,
            width = width
        );
        for step in &job.steps {
            let _ = writeln!(out, "      {}", step_line(step));
        }
    }

    let summary = format!(
        "{} succeeded, {} failed in {:.2}s",
        report.succeeded_count(),
        report.failed_count(),
        report.duration_ms as f64 / 1000.0
    );
    if report.status.is_success() {
        let _ = writeln!(out, "{} Run succeeded: {}", style("✓").green().bold(), summary);
    } else {
        let _ = writeln!(out, "{} Run failed: {}", style("✗").red().bold(), summary);
    }
    out
}

fn job_marker(job: &Job) -> console::StyledObject<&'static str> {
    match job.status {
        JobStatus::Succeeded => style("✓").green(),
        JobStatus::Failed => style("✗").red(),
        JobStatus::Pending | JobStatus::Running => style("…").dim(),
    }
}

fn step_line(step: &StepResult) -> String {
    if step.skipped {
        return format!("{} {} (skipped)", style("-").dim(), style(&step.step_name).dim());
    }
    if let Some(key) = &step.cache_key {
        let outcome = if step.cache_hit { "hit" } else { "miss" };
        return format!("{} {} cache {} [{}]", style("•").cyan(), step.step_name, outcome, key);
    }
    if step.exit_code == 0 {
        format!("{} {}", style("✓").green(), step.step_name)
    } else {
        format!(
            "{} {} (exit code {})",
            style("✗").red(),
            step.step_name,
            step.exit_code
        )
    }
}

/// Label used by `validate` when listing steps.
pub fn kind_label(kind: StepKind) -> &'static str {
    match kind {
        StepKind::Checkout => "checkout",
        StepKind::CacheRestore => "cache_restore",
        StepKind::Build => "build",
        StepKind::Test => "test",
        StepKind::Generic => "generic",
    }
}
