use crate::backend::{CpuAutodiffBackend, DeviceType};
#[cfg(feature = "wgpu")]
use crate::backend::GpuAutodiffBackend;
use crate::config::{ClassSpec, ExperimentConfig, TrainAndEvaluateTaskConfig, TrainTaskConfig};
use crate::datasets::load_dataset;
use crate::error::Result;
use crate::training::{train_and_evaluate_model, TrainOptions};

use super::{model_spec, TaskOutcome};

pub(super) fn run_train(config: &ExperimentConfig, task: &TrainTaskConfig) -> Result<TaskOutcome> {
    train(config, task, None)
}

pub(super) fn run_train_and_evaluate(
    config: &ExperimentConfig,
    task: &TrainAndEvaluateTaskConfig,
) -> Result<TaskOutcome> {
    train(config, &task.train, Some(&task.val_dataset_config))
}

fn train(
    config: &ExperimentConfig,
    task: &TrainTaskConfig,
    val: Option<&ClassSpec>,
) -> Result<TaskOutcome> {
    let spec = model_spec(config)?;
    let (_, train_dataset) = load_dataset(&task.train_dataset_config)?;
    let val_dataset = val.map(load_dataset).transpose()?.map(|(_, ds)| ds);
    let options = TrainOptions::from(task);

    let device = DeviceType::select(spec.common.use_cuda);
    tracing::info!(
        model = %spec.class_spec.classname,
        device = %device,
        epochs = options.epochs,
        validation = val_dataset.is_some(),
        "starting training"
    );

    let summary = match device {
        DeviceType::Cpu => train_and_evaluate_model::<CpuAutodiffBackend>(
            &spec,
            &train_dataset,
            val_dataset.as_ref(),
            &options,
            &DeviceType::cpu_device(),
        )?,
        #[cfg(feature = "wgpu")]
        DeviceType::Wgpu => train_and_evaluate_model::<GpuAutodiffBackend>(
            &spec,
            &train_dataset,
            val_dataset.as_ref(),
            &options,
            &DeviceType::gpu_device(),
        )?,
    };
    Ok(TaskOutcome::Trained(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::{json, Value};
    use std::path::Path;

    fn series_csv(path: &Path) {
        let rows: Vec<String> = (0..6)
            .map(|i| format!("{},{i}.0,{i}.5,1.0,0.0", if i % 2 == 0 { "a" } else { "b" }))
            .collect();
        std::fs::write(path, rows.join("\n")).unwrap();
    }

    fn series_spec(csv: &Path) -> Value {
        json!({
            "classname": "TimeSeriesClassificationDataset",
            "config": {
                "csv_file_path": csv, "labels": ["a", "b"],
                "sequence_length": 2, "input_dim": 2, "batch_size": 2, "num_workers": 0
            }
        })
    }

    fn task(dir: &Path, train: Value) -> TrainTaskConfig {
        serde_json::from_value(json!({
            "epochs": 1,
            "save_epochs": 1,
            "model_directory": dir.join("models"),
            "train_dataset_config": train
        }))
        .unwrap()
    }

    #[test]
    fn test_train_needs_model_section() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("series.csv");
        series_csv(&csv);
        let config: ExperimentConfig =
            serde_json::from_value(json!({"task": {"classname": "TrainTask"}})).unwrap();

        let err = run_train(&config, &task(dir.path(), series_spec(&csv))).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(err.to_string().contains("`model`"));
        assert!(!dir.path().join("models").exists());
    }

    #[test]
    fn test_image_model_on_series_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("series.csv");
        series_csv(&csv);
        let config: ExperimentConfig = serde_json::from_value(json!({
            "model": {"classname": "SimpleCnn", "config": {"num_classes": 2, "image_size": 18}},
            "task": {"classname": "TrainTask"}
        }))
        .unwrap();

        let err = run_train(&config, &task(dir.path(), series_spec(&csv))).unwrap_err();
        assert!(matches!(err, Error::Incompatible { .. }));
    }

    #[test]
    fn test_train_and_evaluate_reports_validation() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("series.csv");
        series_csv(&csv);
        let config: ExperimentConfig = serde_json::from_value(json!({
            "model": {"classname": "TempCnn", "config": {
                "num_classes": 2, "input_dim": 2, "sequence_length": 2,
                "kernel_size": 1, "hidden_dims": 4
            }},
            "task": {"classname": "TrainAndEvaluateTask"}
        }))
        .unwrap();
        let task = TrainAndEvaluateTaskConfig {
            train: task(dir.path(), series_spec(&csv)),
            val_dataset_config: serde_json::from_value(series_spec(&csv)).unwrap(),
        };

        let TaskOutcome::Trained(summary) = run_train_and_evaluate(&config, &task).unwrap() else {
            panic!("expected a training summary");
        };
        assert_eq!(summary.epochs, 1);
        assert_eq!(summary.val.unwrap().samples, 6);
        assert!(summary.checkpoint.is_file());
    }
}
