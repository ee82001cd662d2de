//! Oxide Core
//!
//! Core domain types and error handling for the Oxide pipeline engine.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used across all other crates: trigger events, the pipeline template,
//! jobs, step results and the run report.

pub mod error;
pub mod event;
pub mod ids;
pub mod pipeline;
pub mod run;

pub use error::{Error, Result};
pub use ids::*;
