//! Matrix expansion for parallel job generation.

use oxide_core::Result;
use oxide_core::pipeline::MatrixAxis;
use oxide_core::run::Job;

/// Expander for matrix configurations.
pub struct MatrixExpander;

impl MatrixExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand an axis into one pending job per value, in declaration order.
    pub fn expand(&self, axis: &MatrixAxis) -> Result<Vec<Job>> {
        axis.validate()?;

        let jobs = axis
            .values
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                let mut job = Job::new(idx, value.clone());
                job.variables.insert(axis.name.clone(), value.clone());
                job
            })
            .collect();

        Ok(jobs)
    }

    /// Human readable job name, e.g. `ci (platform=linux)`.
    pub fn display_name(&self, pipeline_name: &str, job: &Job) -> String {
        let parts: Vec<String> = job
            .variables
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        if parts.is_empty() {
            return pipeline_name.to_string();
        }
        format!("{} ({})", pipeline_name, parts.join(", "))
    }
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new()
    }
}
