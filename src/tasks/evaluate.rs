use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::backend::{CpuBackend, DeviceType};
#[cfg(feature = "wgpu")]
use crate::backend::GpuBackend;
use crate::checkpoint;
use crate::config::{
    EvaluateTaskConfig, ExperimentConfig, ExtractFeaturesTaskConfig, PredictTaskConfig,
};
use crate::datasets::{load_dataset, split::ensure_parent, LoadedDataset};
use crate::error::{Error, Result};
use crate::inference::{Evaluation, FeatureRow, LoadedModel, Prediction};
use crate::models::ModelSpec;
use crate::registry;

use super::{dataset_spec, EvaluationReport, TaskOutcome};

/// Backend the checkpoint's model asks for
fn checkpoint_device(path: &Path) -> Result<DeviceType> {
    let metadata = checkpoint::load_metadata(path)?;
    let spec = ModelSpec::from_class_spec(&metadata.model)?;
    Ok(DeviceType::select(spec.common.use_cuda))
}

fn evaluate_on(path: &Path, dataset: &LoadedDataset) -> Result<(Evaluation, Vec<String>)> {
    match checkpoint_device(path)? {
        DeviceType::Cpu => {
            let model = LoadedModel::<CpuBackend>::load(path, &DeviceType::cpu_device())?;
            Ok((model.evaluate(dataset)?, model.labels().to_vec()))
        }
        #[cfg(feature = "wgpu")]
        DeviceType::Wgpu => {
            let model = LoadedModel::<GpuBackend>::load(path, &DeviceType::gpu_device())?;
            Ok((model.evaluate(dataset)?, model.labels().to_vec()))
        }
    }
}

fn predict_on(path: &Path, dataset: &LoadedDataset) -> Result<(Vec<Prediction>, Vec<String>)> {
    match checkpoint_device(path)? {
        DeviceType::Cpu => {
            let model = LoadedModel::<CpuBackend>::load(path, &DeviceType::cpu_device())?;
            Ok((model.predict(dataset)?, model.labels().to_vec()))
        }
        #[cfg(feature = "wgpu")]
        DeviceType::Wgpu => {
            let model = LoadedModel::<GpuBackend>::load(path, &DeviceType::gpu_device())?;
            Ok((model.predict(dataset)?, model.labels().to_vec()))
        }
    }
}

fn features_on(path: &Path, dataset: &LoadedDataset) -> Result<(Vec<FeatureRow>, Vec<String>)> {
    match checkpoint_device(path)? {
        DeviceType::Cpu => {
            let model = LoadedModel::<CpuBackend>::load(path, &DeviceType::cpu_device())?;
            Ok((model.features(dataset)?, model.labels().to_vec()))
        }
        #[cfg(feature = "wgpu")]
        DeviceType::Wgpu => {
            let model = LoadedModel::<GpuBackend>::load(path, &DeviceType::gpu_device())?;
            Ok((model.features(dataset)?, model.labels().to_vec()))
        }
    }
}

/// Predict a single image with the checkpoint at `model_path`.
///
/// # Returns
/// - the prediction and the label names its indices refer to
pub fn predict_image(model_path: &Path, image: &Path) -> Result<(Prediction, Vec<String>)> {
    match checkpoint_device(model_path)? {
        DeviceType::Cpu => {
            let model = LoadedModel::<CpuBackend>::load(model_path, &DeviceType::cpu_device())?;
            Ok((model.predict_image(image)?, model.labels().to_vec()))
        }
        #[cfg(feature = "wgpu")]
        DeviceType::Wgpu => {
            let model = LoadedModel::<GpuBackend>::load(model_path, &DeviceType::gpu_device())?;
            Ok((model.predict_image(image)?, model.labels().to_vec()))
        }
    }
}

pub(super) fn run_evaluate(
    config: &ExperimentConfig,
    task: &EvaluateTaskConfig,
) -> Result<TaskOutcome> {
    let metrics = registry::resolve_metrics(&task.metrics)?;
    let (_, dataset) = load_dataset(dataset_spec(config, task.dataset_config.as_ref())?)?;

    let (evaluation, labels) = evaluate_on(&task.model_path, &dataset)?;
    let report = evaluation.score.get_scores(&metrics);
    for (key, score) in &report.scores {
        for (label, value) in labels.iter().zip(&score.per_label) {
            tracing::debug!(metric = %key, label = %label, value, "per-label score");
        }
    }
    let report = EvaluationReport {
        loss: evaluation.loss,
        report,
    };

    if let Some(path) = &task.output_file {
        ensure_parent(path)?;
        let content = serde_json::to_string_pretty(&report).map_err(|source| Error::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(path, content).map_err(|e| Error::io(path, e))?;
        tracing::info!(file = %path.display(), "evaluation report written");
    }
    Ok(TaskOutcome::Evaluated(report))
}

#[derive(Debug, Serialize)]
struct PredictionRow {
    index: usize,
    #[serde(rename = "true")]
    truth: String,
    predicted: String,
    probabilities: String,
}

fn label_names(indices: &[usize], labels: &[String]) -> String {
    indices
        .iter()
        .map(|&i| labels.get(i).cloned().unwrap_or_else(|| i.to_string()))
        .collect::<Vec<_>>()
        .join(";")
}

/// Write predictions as `index,true,predicted,probabilities` rows; label
/// sets and probabilities are `;`-separated.
fn write_predictions(path: &Path, predictions: &[Prediction], labels: &[String]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::csv(path, e))?;
    for (index, prediction) in predictions.iter().enumerate() {
        let probabilities: Vec<String> = prediction
            .probabilities
            .iter()
            .map(|p| format!("{p:.4}"))
            .collect();
        writer
            .serialize(PredictionRow {
                index,
                truth: label_names(&prediction.truth, labels),
                predicted: label_names(&prediction.predicted, labels),
                probabilities: probabilities.join(";"),
            })
            .map_err(|e| Error::csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}

pub(super) fn run_predict(config: &ExperimentConfig, task: &PredictTaskConfig) -> Result<TaskOutcome> {
    let (_, dataset) = load_dataset(dataset_spec(config, task.dataset_config.as_ref())?)?;
    let (predictions, labels) = predict_on(&task.model_path, &dataset)?;
    write_predictions(&task.output_file, &predictions, &labels)?;
    Ok(TaskOutcome::Predicted {
        count: predictions.len(),
        path: task.output_file.clone(),
    })
}

/// Write `index,true,f0,...,fN` rows
fn write_features(path: &Path, rows: &[FeatureRow], labels: &[String]) -> Result<usize> {
    ensure_parent(path)?;
    let width = rows.first().map_or(0, |row| row.features.len());
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::csv(path, e))?;

    let mut header = vec!["index".to_string(), "true".to_string()];
    header.extend((0..width).map(|i| format!("f{i}")));
    writer.write_record(&header).map_err(|e| Error::csv(path, e))?;

    for (index, row) in rows.iter().enumerate() {
        let mut record = vec![index.to_string(), label_names(&row.truth, labels)];
        record.extend(row.features.iter().map(|v| format!("{v:.6}")));
        writer.write_record(&record).map_err(|e| Error::csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(width)
}

pub(super) fn run_extract_features(
    config: &ExperimentConfig,
    task: &ExtractFeaturesTaskConfig,
) -> Result<TaskOutcome> {
    let (_, dataset) = load_dataset(dataset_spec(config, task.dataset_config.as_ref())?)?;
    let (rows, labels) = features_on(&task.model_path, &dataset)?;
    let width = write_features(&task.output_file, &rows, &labels)?;
    tracing::info!(file = %task.output_file.display(), samples = rows.len(), width, "features written");
    Ok(TaskOutcome::Extracted {
        count: rows.len(),
        width,
        path: task.output_file.clone(),
    })
}
