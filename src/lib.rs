//! Config-driven remote-sensing classification.
//!
//! An experiment is a JSON document naming a model, a dataset and a task by
//! class name. [`run_experiment`] validates the document, builds what it
//! names and runs the task on a burn backend.

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod datasets;
pub mod error;
pub mod inference;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod tasks;
pub mod training;

pub use config::{ClassSpec, ExperimentConfig};
pub use error::{Error, Result};
pub use tasks::{check_experiment, run_experiment, TaskOutcome};
pub use training::{train_and_evaluate_model, train_model, TrainOptions, TrainSummary};

#[cfg(test)]
pub(crate) type TestBackend = backend::CpuBackend;
#[cfg(test)]
pub(crate) type TestAutodiffBackend = backend::CpuAutodiffBackend;
