//! Class-name resolution.
//!
//! Documents name their model, dataset, task and metrics with dotted class
//! names such as `eo_toolbox.models.TempCnn`. Only the final segment selects
//! the type; a category segment (`models`, `datasets`, `tasks`, `metrics`),
//! when present, has to match what is being looked up.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::ClassSpec;
use crate::error::{Error, Result};

/// A validated dotted identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassName<'a> {
    segments: Vec<&'a str>,
}

impl<'a> ClassName<'a> {
    pub fn parse(name: &'a str) -> std::result::Result<Self, String> {
        if name.is_empty() {
            return Err("class name must not be empty".into());
        }
        let segments: Vec<&str> = name.split('.').collect();
        for segment in &segments {
            if !is_identifier(segment) {
                return Err(format!("`{name}` is not a dotted identifier"));
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    /// Final segment, the type name
    pub fn type_name(&self) -> &'a str {
        self.segments[self.segments.len() - 1]
    }

    /// Known category segment, if the name carries one
    pub fn category(&self) -> Option<&'a str> {
        self.segments[..self.segments.len() - 1]
            .iter()
            .rev()
            .find(|s| CATEGORIES.contains(s))
            .copied()
    }
}

const CATEGORIES: [&str; 4] = ["models", "datasets", "tasks", "metrics"];

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    SimpleCnn,
    SimpleCnnMultiLabel,
    TempCnn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    MultiClass,
    ImageFolder,
    MultiLabel,
    UcMercedMultiLabel,
    TimeSeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Train,
    TrainAndEvaluate,
    Evaluate,
    Predict,
    Split,
    Stats,
    ExtractFeatures,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    Accuracy,
    Precision,
    Recall,
    F1Score,
}

impl MetricKind {
    /// Short key used in reports and model configs
    pub fn key(&self) -> &'static str {
        match self {
            MetricKind::Accuracy => "accuracy",
            MetricKind::Precision => "precision",
            MetricKind::Recall => "recall",
            MetricKind::F1Score => "f1_score",
        }
    }
}

const MODEL_TABLE: &[(&str, ModelKind)] = &[
    ("SimpleCnn", ModelKind::SimpleCnn),
    ("SimpleCnnMultiLabel", ModelKind::SimpleCnnMultiLabel),
    ("TempCnn", ModelKind::TempCnn),
    ("TempCNN", ModelKind::TempCnn),
];

const DATASET_TABLE: &[(&str, DatasetKind)] = &[
    ("MultiClassClassificationDataset", DatasetKind::MultiClass),
    ("ImageFolderDataset", DatasetKind::ImageFolder),
    ("MultiLabelClassificationDataset", DatasetKind::MultiLabel),
    ("UcMercedMultiLabelDataset", DatasetKind::UcMercedMultiLabel),
    ("TimeSeriesClassificationDataset", DatasetKind::TimeSeries),
];

const TASK_TABLE: &[(&str, TaskKind)] = &[
    ("TrainTask", TaskKind::Train),
    ("TrainAndEvaluateTask", TaskKind::TrainAndEvaluate),
    ("EvaluateTask", TaskKind::Evaluate),
    ("PredictTask", TaskKind::Predict),
    ("SplitTask", TaskKind::Split),
    ("StatsTask", TaskKind::Stats),
    ("ExtractFeaturesTask", TaskKind::ExtractFeatures),
];

// Metrics are also named by their short keys inside model configs.
const METRIC_TABLE: &[(&str, MetricKind)] = &[
    ("AccuracyScore", MetricKind::Accuracy),
    ("accuracy", MetricKind::Accuracy),
    ("PrecisionScore", MetricKind::Precision),
    ("precision", MetricKind::Precision),
    ("RecallScore", MetricKind::Recall),
    ("recall", MetricKind::Recall),
    ("F1Score", MetricKind::F1Score),
    ("f1_score", MetricKind::F1Score),
];

fn lookup<T: Copy>(
    category: &'static str,
    segment: &'static str,
    table: &[(&str, T)],
    name: &str,
) -> Result<T> {
    let unknown = || Error::UnknownClass {
        category,
        name: name.to_string(),
    };
    let class = ClassName::parse(name).map_err(|_| unknown())?;
    if let Some(found) = class.category() {
        if found != segment {
            return Err(unknown());
        }
    }
    table
        .iter()
        .find(|(key, _)| *key == class.type_name())
        .map(|(_, kind)| *kind)
        .ok_or_else(unknown)
}

pub fn resolve_model(name: &str) -> Result<ModelKind> {
    lookup("model", "models", MODEL_TABLE, name)
}

pub fn resolve_dataset(name: &str) -> Result<DatasetKind> {
    lookup("dataset", "datasets", DATASET_TABLE, name)
}

pub fn resolve_task(name: &str) -> Result<TaskKind> {
    lookup("task", "tasks", TASK_TABLE, name)
}

pub fn resolve_metric(name: &str) -> Result<MetricKind> {
    lookup("metric", "metrics", METRIC_TABLE, name)
}

/// Resolve a list of metric names, dropping duplicates and keeping order
pub fn resolve_metrics<S: AsRef<str>>(names: &[S]) -> Result<Vec<MetricKind>> {
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let kind = resolve_metric(name.as_ref())?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Turn a config mapping into its typed settings.
///
/// Missing keys take their defaults; keys the settings type does not know
/// are an error.
pub fn instantiate<T>(spec: &ClassSpec) -> Result<T>
where
    T: DeserializeOwned + Serialize,
{
    let invalid = |msg: String| Error::InvalidConfig {
        classname: spec.classname.clone(),
        msg,
    };

    let typed: T = serde_json::from_value(Value::Object(spec.config.clone()))
        .map_err(|e| invalid(e.to_string()))?;

    let known: Map<String, Value> = match serde_json::to_value(&typed) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => return Err(invalid(e.to_string())),
    };
    let mut unknown: Vec<&str> = spec
        .config
        .keys()
        .filter(|key| !known.contains_key(key.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(invalid(format!("unknown keys: {}", unknown.join(", "))));
    }

    Ok(typed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MultiClassDatasetConfig, TrainTaskConfig};
    use serde_json::json;

    fn spec(classname: &str, config: Value) -> ClassSpec {
        let Value::Object(map) = config else {
            panic!("config must be an object");
        };
        ClassSpec::new(classname, map)
    }

    #[test]
    fn test_parse_dotted_identifier() {
        let name = ClassName::parse("eo_toolbox.models.TempCnn").unwrap();
        assert_eq!(name.segments().len(), 3);
        assert_eq!(name.type_name(), "TempCnn");
        assert_eq!(name.category(), Some("models"));

        assert_eq!(ClassName::parse("F1Score").unwrap().category(), None);
        assert!(ClassName::parse("").is_err());
        assert!(ClassName::parse("a..b").is_err());
        assert!(ClassName::parse("models.1Net").is_err());
        assert!(ClassName::parse("models.Temp-Cnn").is_err());
        assert!(ClassName::parse(".models").is_err());
    }

    #[test]
    fn test_resolve_by_final_segment() {
        assert_eq!(resolve_model("aitlas.models.TempCNN").unwrap(), ModelKind::TempCnn);
        assert_eq!(resolve_model("SimpleCnn").unwrap(), ModelKind::SimpleCnn);
        assert_eq!(
            resolve_dataset("eo_toolbox.datasets.UcMercedMultiLabelDataset").unwrap(),
            DatasetKind::UcMercedMultiLabel
        );
        assert_eq!(resolve_task("tasks.TrainAndEvaluateTask").unwrap(), TaskKind::TrainAndEvaluate);
        assert_eq!(
            resolve_task("aitlas.tasks.ExtractFeaturesTask").unwrap(),
            TaskKind::ExtractFeatures
        );
        assert_eq!(resolve_metric("metrics.F1Score").unwrap(), MetricKind::F1Score);
        assert_eq!(resolve_metric("accuracy").unwrap(), MetricKind::Accuracy);
    }

    #[test]
    fn test_category_mismatch_is_unknown() {
        let err = resolve_model("eo_toolbox.datasets.SimpleCnn").unwrap_err();
        assert!(matches!(err, Error::UnknownClass { category: "model", .. }));
        assert!(resolve_task("models.Nonexistent").is_err());
    }

    #[test]
    fn test_resolve_metrics_dedups() {
        let kinds = resolve_metrics(&["f1_score", "metrics.F1Score", "accuracy"]).unwrap();
        assert_eq!(kinds, vec![MetricKind::F1Score, MetricKind::Accuracy]);
    }

    #[test]
    fn test_instantiate_fills_defaults() {
        let cfg: MultiClassDatasetConfig = instantiate(&spec(
            "datasets.MultiClassClassificationDataset",
            json!({"csv_file_path": "x.csv", "batch_size": 16}),
        ))
        .unwrap();
        assert_eq!(cfg.common.loader.batch_size, 16);
        assert_eq!(cfg.common.loader.num_workers, 2);
    }

    #[test]
    fn test_instantiate_rejects_unknown_keys() {
        let err = instantiate::<MultiClassDatasetConfig>(&spec(
            "datasets.MultiClassClassificationDataset",
            json!({"csv_file_path": "x.csv", "bach_size": 16, "colour": "red"}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("unknown keys: bach_size, colour"));
    }

    #[test]
    fn test_instantiate_nested_class_spec() {
        let cfg: TrainTaskConfig = instantiate(&spec(
            "tasks.TrainTask",
            json!({
                "model_directory": "out",
                "train_dataset_config": {
                    "classname": "datasets.ImageFolderDataset",
                    "config": {"data_dir": "images"}
                }
            }),
        ))
        .unwrap();
        assert_eq!(
            resolve_dataset(&cfg.train_dataset_config.classname).unwrap(),
            DatasetKind::ImageFolder
        );
    }

    #[test]
    fn test_instantiate_missing_required_key() {
        let err = instantiate::<MultiClassDatasetConfig>(&spec(
            "datasets.MultiClassClassificationDataset",
            json!({}),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
