//! Event-to-report orchestration.

use crate::matrix::MatrixExpander;
use crate::scheduler::JobScheduler;
use crate::triggers::TriggerEvaluator;
use oxide_core::Result;
use oxide_core::event::EventDescriptor;
use oxide_core::pipeline::{PipelineDefinition, StepDefinition};
use oxide_core::run::RunReport;
use std::sync::Arc;
use tracing::info;

/// Chains trigger evaluation, matrix expansion and job scheduling.
pub struct PipelineEngine {
    trigger_evaluator: TriggerEvaluator,
    matrix_expander: MatrixExpander,
    scheduler: JobScheduler,
}

impl PipelineEngine {
    pub fn new(scheduler: JobScheduler) -> Self {
        Self {
            trigger_evaluator: TriggerEvaluator::new(),
            matrix_expander: MatrixExpander::new(),
            scheduler,
        }
    }

    /// Handle an event for one pipeline.
    ///
    /// Returns `Ok(None)` when the event does not trigger a run. Configuration
    /// errors surface before any job starts.
    pub async fn handle_trigger(
        &self,
        definition: &PipelineDefinition,
        event: &EventDescriptor,
    ) -> Result<Option<RunReport>> {
        definition.validate()?;

        let decision = self
            .trigger_evaluator
            .evaluate(event, &definition.triggers)?;
        if !decision.run {
            info!(pipeline = %definition.name, event = %event.kind, reason = %decision.reason, "Run not triggered");
            return Ok(None);
        }
        info!(pipeline = %definition.name, event = %event.kind, reason = %decision.reason, "Run triggered");

        let mut jobs = self.matrix_expander.expand(&definition.matrix)?;
        for job in &mut jobs {
            let mut variables = definition.variables.clone();
            variables.append(&mut job.variables);
            job.variables = variables;
            info!(job = %self.matrix_expander.display_name(&definition.name, job), "Job expanded");
        }

        let steps: Arc<[StepDefinition]> = definition.steps.clone().into();
        let report = self
            .scheduler
            .run_all(&definition.name, jobs, steps, definition.max_concurrency)
            .await;
        Ok(Some(report))
    }
}
