//! Experiment container lifecycle management.
//!
//! [`manager::ExperimentManager`] owns the registry of in-flight
//! executions and is the single source of truth for their state. The
//! container runtime itself sits behind the [`runtime::ContainerRuntime`]
//! seam; production uses the Docker implementation, tests substitute a
//! stub. [`archive`] packages an experiment's results into a zip.

pub mod archive;
pub mod manager;
pub mod runtime;

pub use manager::ExperimentManager;
pub use runtime::{ContainerRuntime, DockerRuntime};
