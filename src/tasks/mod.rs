//! Run modes selected by the document's `task` section.
//!
//! [`run_experiment`] checks the document, resolves the task class and hands
//! its typed config to one of the runners below. Tasks that need a dataset
//! take it from their own `dataset_config` when set and fall back to the
//! document's top-level `dataset`.

mod data;
mod evaluate;
mod train;

pub use evaluate::predict_image;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::config::{
    ClassSpec, EvaluateTaskConfig, ExperimentConfig, ExtractFeaturesTaskConfig, PredictTaskConfig,
    SplitTaskConfig, StatsTaskConfig, TrainAndEvaluateTaskConfig, TrainTaskConfig,
    NESTED_DATASET_KEYS,
};
use crate::datasets::SplitOutcome;
use crate::error::{Error, Result};
use crate::metrics::MetricReport;
use crate::models::ModelSpec;
use crate::registry::{self, TaskKind};
use crate::training::TrainSummary;

/// What a task produced
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Trained(TrainSummary),
    Evaluated(EvaluationReport),
    Predicted { count: usize, path: PathBuf },
    Extracted { count: usize, width: usize, path: PathBuf },
    Split(SplitOutcome),
    Stats(Vec<(String, usize)>),
}

/// Mean loss and scores of an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub loss: f64,
    #[serde(flatten)]
    pub report: MetricReport,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Trained(summary) => write!(
                f,
                "run {} finished after {} epochs (loss {:.4}), checkpoint {}",
                summary.run_id,
                summary.epochs,
                summary.loss,
                summary.checkpoint.display()
            ),
            TaskOutcome::Evaluated(eval) => write!(f, "loss {:.4}; {}", eval.loss, eval.report),
            TaskOutcome::Predicted { count, path } => {
                write!(f, "{count} predictions written to {}", path.display())
            }
            TaskOutcome::Extracted { count, width, path } => write!(
                f,
                "{count} feature vectors of width {width} written to {}",
                path.display()
            ),
            TaskOutcome::Split(SplitOutcome::Skipped) => write!(f, "split files already exist"),
            TaskOutcome::Split(SplitOutcome::Written(parts)) => {
                let parts: Vec<String> = parts
                    .iter()
                    .map(|(part, path, n)| format!("{}: {n} ({})", part.as_str(), path.display()))
                    .collect();
                write!(f, "split written; {}", parts.join(", "))
            }
            TaskOutcome::Stats(counts) => {
                let counts: Vec<String> =
                    counts.iter().map(|(label, n)| format!("{label}={n}")).collect();
                write!(f, "{}", counts.join(", "))
            }
        }
    }
}

/// Validate the document and resolve every class it names without loading
/// any data. Returns the task to run.
pub fn check_experiment(config: &ExperimentConfig) -> Result<TaskKind> {
    config.validate()?;
    let kind = registry::resolve_task(&config.task.classname)?;

    if let Some(model) = &config.model {
        ModelSpec::from_class_spec(model)?;
    }
    if let Some(dataset) = &config.dataset {
        registry::resolve_dataset(&dataset.classname)?;
    }
    for key in NESTED_DATASET_KEYS {
        if let Some(value) = config.task.config.get(key) {
            let spec: ClassSpec =
                serde_json::from_value(value.clone()).map_err(|e| Error::InvalidConfig {
                    classname: config.task.classname.clone(),
                    msg: format!("{key}: {e}"),
                })?;
            registry::resolve_dataset(&spec.classname)?;
        }
    }

    match kind {
        TaskKind::Train => {
            registry::instantiate::<TrainTaskConfig>(&config.task)?;
        }
        TaskKind::TrainAndEvaluate => {
            registry::instantiate::<TrainAndEvaluateTaskConfig>(&config.task)?;
        }
        TaskKind::Evaluate => {
            let task: EvaluateTaskConfig = registry::instantiate(&config.task)?;
            registry::resolve_metrics(&task.metrics)?;
        }
        TaskKind::Predict => {
            registry::instantiate::<PredictTaskConfig>(&config.task)?;
        }
        TaskKind::Split => {
            registry::instantiate::<SplitTaskConfig>(&config.task)?;
        }
        TaskKind::Stats => {
            registry::instantiate::<StatsTaskConfig>(&config.task)?;
        }
        TaskKind::ExtractFeatures => {
            registry::instantiate::<ExtractFeaturesTaskConfig>(&config.task)?;
        }
    }
    if matches!(kind, TaskKind::Train | TaskKind::TrainAndEvaluate) && config.model.is_none() {
        return Err(missing(config, "model"));
    }
    Ok(kind)
}

/// Run the task an experiment document describes
pub fn run_experiment(config: &ExperimentConfig) -> Result<TaskOutcome> {
    let kind = check_experiment(config)?;
    tracing::info!(task = %config.task.classname, "running task");

    let outcome = match kind {
        TaskKind::Train => train::run_train(config, &registry::instantiate(&config.task)?),
        TaskKind::TrainAndEvaluate => {
            train::run_train_and_evaluate(config, &registry::instantiate(&config.task)?)
        }
        TaskKind::Evaluate => evaluate::run_evaluate(config, &registry::instantiate(&config.task)?),
        TaskKind::Predict => evaluate::run_predict(config, &registry::instantiate(&config.task)?),
        TaskKind::Split => data::run_split(config, &registry::instantiate(&config.task)?),
        TaskKind::Stats => data::run_stats(config, &registry::instantiate(&config.task)?),
        TaskKind::ExtractFeatures => {
            evaluate::run_extract_features(config, &registry::instantiate(&config.task)?)
        }
    }?;

    tracing::info!(task = %config.task.classname, "{outcome}");
    Ok(outcome)
}

fn missing(config: &ExperimentConfig, what: &str) -> Error {
    Error::InvalidConfig {
        classname: config.task.classname.clone(),
        msg: format!("this task needs a `{what}` section"),
    }
}

fn model_spec(config: &ExperimentConfig) -> Result<ModelSpec> {
    let model = config.model.as_ref().ok_or_else(|| missing(config, "model"))?;
    ModelSpec::from_class_spec(model)
}

/// The task's own dataset, else the document's
fn dataset_spec<'a>(
    config: &'a ExperimentConfig,
    task_dataset: Option<&'a ClassSpec>,
) -> Result<&'a ClassSpec> {
    task_dataset
        .or(config.dataset.as_ref())
        .ok_or_else(|| missing(config, "dataset"))
}
