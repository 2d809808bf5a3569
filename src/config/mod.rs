//! Experiment configuration documents.
//!
//! A document has three sections, each a `{classname, config}` pair:
//!
//! ```json
//! {
//!   "model":   {"classname": "eo_toolbox.models.SimpleCnn", "config": {"num_classes": 2}},
//!   "dataset": {"classname": "eo_toolbox.datasets.MultiClassClassificationDataset", "config": {}},
//!   "task":    {"classname": "eo_toolbox.tasks.TrainTask", "config": {"epochs": 5}}
//! }
//! ```
//!
//! The document layer only checks structure. Each `config` mapping is
//! interpreted by the typed settings in [`schemas`] once the class name has
//! been resolved by [`crate::registry`].

pub mod schemas;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::registry::ClassName;

pub use schemas::{
    DatasetCommon, EvaluateTaskConfig, ExtractFeaturesTaskConfig, ImageFolderDatasetConfig, LoaderConfig, ModelCommon,
    MultiClassDatasetConfig, MultiLabelDatasetConfig, PredictTaskConfig, SimpleCnnSettings,
    SplitConfig, SplitPart, SplitSetConfig, SplitTaskConfig, StatsTaskConfig, TempCnnSettings,
    TimeSeriesDatasetConfig, TrainAndEvaluateTaskConfig, TrainTaskConfig,
};

/// Keys inside `task.config` that hold nested dataset class specs.
pub const NESTED_DATASET_KEYS: [&str; 3] =
    ["train_dataset_config", "val_dataset_config", "dataset_config"];

/// A class name plus the mapping handed to that class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub classname: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl ClassSpec {
    pub fn new(classname: impl Into<String>, config: Map<String, Value>) -> Self {
        Self {
            classname: classname.into(),
            config,
        }
    }
}

/// Experiment configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Model to build (not needed by split/stats tasks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ClassSpec>,
    /// Fallback dataset for tasks that take a single dataset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<ClassSpec>,
    /// Run mode
    pub task: ClassSpec,
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| Error::Json {
            path: "<inline>".into(),
            source,
        })
    }

    /// Read a document from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&content).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the document as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|e| Error::io(path, e))
    }

    /// Structural checks over the whole document.
    ///
    /// Every problem found is reported, not only the first one.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();

        if let Some(model) = &self.model {
            check_class_spec("model", model, &mut issues);
        }
        if let Some(dataset) = &self.dataset {
            check_class_spec("dataset", dataset, &mut issues);
            check_split("dataset", &dataset.config, &mut issues);
        }
        check_class_spec("task", &self.task, &mut issues);
        check_task_config(&self.task.config, &mut issues);

        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(issues))
        }
    }
}

fn check_class_spec(section: &str, spec: &ClassSpec, issues: &mut Vec<String>) {
    if let Err(msg) = ClassName::parse(&spec.classname) {
        issues.push(format!("{section}.classname: {msg}"));
    }
}

fn check_task_config(config: &Map<String, Value>, issues: &mut Vec<String>) {
    for key in NESTED_DATASET_KEYS {
        let Some(value) = config.get(key) else {
            continue;
        };
        let section = format!("task.config.{key}");
        match serde_json::from_value::<ClassSpec>(value.clone()) {
            Ok(spec) => {
                check_class_spec(&section, &spec, issues);
                check_split(&section, &spec.config, issues);
            }
            Err(e) => issues.push(format!("{section}: expected {{classname, config}}: {e}")),
        }
    }

    if let Some(metrics) = config.get("metrics") {
        match metrics.as_array() {
            Some(entries) => {
                for (i, entry) in entries.iter().enumerate() {
                    match entry.as_str() {
                        Some(name) => {
                            if let Err(msg) = ClassName::parse(name) {
                                issues.push(format!("task.config.metrics[{i}]: {msg}"));
                            }
                        }
                        None => issues.push(format!("task.config.metrics[{i}]: expected a string")),
                    }
                }
            }
            None => issues.push("task.config.metrics: expected a list of class names".into()),
        }
    }

    let epochs = positive_int(config, "epochs", issues);
    let save_epochs = positive_int(config, "save_epochs", issues);
    if let Some(save_epochs) = save_epochs {
        let epochs = epochs.unwrap_or(schemas::DEFAULT_EPOCHS);
        if save_epochs > epochs {
            issues.push(format!(
                "task.config.save_epochs ({save_epochs}) must not exceed epochs ({epochs})"
            ));
        }
    }
}

fn positive_int(config: &Map<String, Value>, key: &str, issues: &mut Vec<String>) -> Option<usize> {
    let value = config.get(key)?;
    match value.as_u64() {
        Some(n) if n > 0 => Some(n as usize),
        _ => {
            issues.push(format!("task.config.{key}: expected a positive integer, got {value}"));
            None
        }
    }
}

fn check_split(section: &str, config: &Map<String, Value>, issues: &mut Vec<String>) {
    let Some(split) = config.get("split") else {
        return;
    };
    if split.is_null() {
        return;
    }
    match serde_json::from_value::<SplitConfig>(split.clone()) {
        Ok(split) => {
            if let Err(msg) = split.validate() {
                issues.push(format!("{section}.config.split: {msg}"));
            }
        }
        Err(e) => issues.push(format!("{section}.config.split: {e}")),
    }
}
