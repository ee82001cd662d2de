//! Step execution engine for the Oxide pipeline engine.

pub mod environments;
pub mod executor;
pub mod runner;
pub mod shell;

pub use environments::{EnvironmentFactory, ExecutionEnvironment, HostEnvironment, WorkspaceLayout};
pub use executor::StepExecutor;
pub use runner::{CommandExecutor, RunnerConfig, StepContext};
pub use shell::ShellRunner;
