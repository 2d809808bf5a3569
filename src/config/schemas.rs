//! Typed settings behind each `config` mapping.
//!
//! Defaults are filled in here, so a mapping only needs the keys it wants to
//! change. Unknown keys are rejected by [`crate::registry::instantiate`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ClassSpec;

pub const DEFAULT_EPOCHS: usize = 100;
pub const DEFAULT_SAVE_EPOCHS: usize = 10;
pub const DEFAULT_ITERATIONS_LOG: usize = 100;

fn default_batch_size() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_num_workers() -> usize {
    2
}

fn default_seed() -> u64 {
    42
}

fn default_image_size() -> usize {
    64
}

fn default_delimiter() -> char {
    ','
}

fn default_learning_rate() -> f64 {
    1e-3
}

fn default_model_metrics() -> Vec<String> {
    vec!["f1_score".to_string()]
}

fn default_threshold() -> f32 {
    0.5
}

fn default_lr_gamma() -> f64 {
    0.1
}

fn default_dropout() -> f64 {
    0.5
}

fn default_kernel_size() -> usize {
    5
}

fn default_hidden_dims() -> usize {
    64
}

fn default_epochs() -> usize {
    DEFAULT_EPOCHS
}

fn default_save_epochs() -> usize {
    DEFAULT_SAVE_EPOCHS
}

fn default_iterations_log() -> usize {
    DEFAULT_ITERATIONS_LOG
}

fn default_eval_metrics() -> Vec<String> {
    ["AccuracyScore", "PrecisionScore", "RecallScore", "F1Score"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// datasets
// ---------------------------------------------------------------------------

/// Loader parameters shared by every dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Seed for shuffling and splitting
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            shuffle: true,
            num_workers: default_num_workers(),
            seed: default_seed(),
        }
    }
}

/// One part of a split: its share in percent and where its rows go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSetConfig {
    pub ratio: u32,
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub train: SplitSetConfig,
    #[serde(default)]
    pub val: Option<SplitSetConfig>,
    pub test: SplitSetConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPart {
    Train,
    Val,
    Test,
}

impl SplitPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitPart::Train => "train",
            SplitPart::Val => "val",
            SplitPart::Test => "test",
        }
    }
}

impl SplitConfig {
    /// Present parts in train, val, test order
    pub fn parts(&self) -> Vec<(SplitPart, &SplitSetConfig)> {
        let mut parts = vec![(SplitPart::Train, &self.train)];
        if let Some(val) = &self.val {
            parts.push((SplitPart::Val, val));
        }
        parts.push((SplitPart::Test, &self.test));
        parts
    }

    pub fn total_ratio(&self) -> u64 {
        self.parts().iter().map(|(_, set)| u64::from(set.ratio)).sum()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let total = self.total_ratio();
        if total != 100 {
            return Err(format!("ratios must sum to 100, got {total}"));
        }
        Ok(())
    }
}

/// Fields every dataset config accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DatasetCommon {
    #[serde(flatten)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub split: Option<SplitConfig>,
    /// Overwrite split files that already exist
    #[serde(default, rename = "override")]
    pub override_existing: bool,
}

/// CSV of `image_path,label` rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiClassDatasetConfig {
    #[serde(flatten)]
    pub common: DatasetCommon,
    pub csv_file_path: PathBuf,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Relative image paths are resolved against this (default: the CSV's directory)
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    #[serde(default = "default_image_size")]
    pub image_size: usize,
}

/// One sub-directory per label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFolderDatasetConfig {
    #[serde(flatten)]
    pub common: DatasetCommon,
    pub data_dir: PathBuf,
    /// Label order (default: sorted sub-directory names)
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default = "default_image_size")]
    pub image_size: usize,
}

/// CSV with an `image,<label>,<label>...` header and 0/1 cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLabelDatasetConfig {
    #[serde(flatten)]
    pub common: DatasetCommon,
    pub csv_file_path: PathBuf,
    /// Expected label columns (default: taken from the header)
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    #[serde(default = "default_image_size")]
    pub image_size: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

/// CSV of `label,v1,...,vN` rows with `N = sequence_length * input_dim`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesDatasetConfig {
    #[serde(flatten)]
    pub common: DatasetCommon,
    pub csv_file_path: PathBuf,
    pub labels: Vec<String>,
    pub sequence_length: usize,
    pub input_dim: usize,
}

// ---------------------------------------------------------------------------
// models
// ---------------------------------------------------------------------------

/// Fields every model config accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCommon {
    pub num_classes: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Train on the GPU backend when the crate is built with it
    #[serde(default)]
    pub use_cuda: bool,
    /// Metrics reported during training
    #[serde(default = "default_model_metrics")]
    pub metrics: Vec<String>,
    /// Per-class loss weights (multi-class only)
    #[serde(default)]
    pub weights: Option<Vec<f32>>,
    /// Decision threshold on sigmoid outputs (multi-label only)
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Multiply the learning rate by `lr_gamma` every `lr_step_size` epochs
    #[serde(default)]
    pub lr_step_size: Option<usize>,
    #[serde(default = "default_lr_gamma")]
    pub lr_gamma: f64,
}

impl ModelCommon {
    /// Learning rate for the 0-based `epoch`
    pub fn learning_rate_at(&self, epoch: usize) -> f64 {
        match self.lr_step_size {
            Some(step) if step > 0 => {
                let decays = i32::try_from(epoch / step).unwrap_or(i32::MAX);
                self.learning_rate * self.lr_gamma.powi(decays)
            }
            _ => self.learning_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleCnnSettings {
    #[serde(flatten)]
    pub common: ModelCommon,
    #[serde(default = "default_image_size")]
    pub image_size: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempCnnSettings {
    #[serde(flatten)]
    pub common: ModelCommon,
    pub input_dim: usize,
    pub sequence_length: usize,
    #[serde(default = "default_kernel_size")]
    pub kernel_size: usize,
    #[serde(default = "default_hidden_dims")]
    pub hidden_dims: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f64,
}

// ---------------------------------------------------------------------------
// tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainTaskConfig {
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    pub model_directory: PathBuf,
    #[serde(default = "default_save_epochs")]
    pub save_epochs: usize,
    #[serde(default = "default_iterations_log")]
    pub iterations_log: usize,
    /// Checkpoint to continue from
    #[serde(default)]
    pub resume_model: Option<PathBuf>,
    /// Run id (default: start timestamp)
    #[serde(default)]
    pub id: Option<String>,
    pub train_dataset_config: ClassSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainAndEvaluateTaskConfig {
    #[serde(flatten)]
    pub train: TrainTaskConfig,
    pub val_dataset_config: ClassSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateTaskConfig {
    pub model_path: PathBuf,
    #[serde(default)]
    pub dataset_config: Option<ClassSpec>,
    #[serde(default = "default_eval_metrics")]
    pub metrics: Vec<String>,
    /// Write the metric report here as JSON
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictTaskConfig {
    pub model_path: PathBuf,
    #[serde(default)]
    pub dataset_config: Option<ClassSpec>,
    pub output_file: PathBuf,
}

/// Penultimate-layer activations written as `index,true,f0,...` rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractFeaturesTaskConfig {
    pub model_path: PathBuf,
    #[serde(default)]
    pub dataset_config: Option<ClassSpec>,
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitTaskConfig {
    #[serde(default)]
    pub dataset_config: Option<ClassSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsTaskConfig {
    #[serde(default)]
    pub dataset_config: Option<ClassSpec>,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}
