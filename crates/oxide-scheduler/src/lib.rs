//! Trigger evaluation, matrix expansion and job scheduling for Oxide.

pub mod engine;
pub mod matrix;
pub mod scheduler;
pub mod triggers;

pub use engine::PipelineEngine;
pub use matrix::MatrixExpander;
pub use scheduler::JobScheduler;
pub use triggers::TriggerEvaluator;
