//! Training loop.
//!
//! A hand-written epoch loop rather than burn's `Learner`: checkpoints are
//! saved on a fixed epoch cadence together with the optimizer state, and a
//! run can be resumed from any of them.

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::backend::{AutodiffBackend, Backend},
};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checkpoint::{self, Checkpoint, CheckpointMetadata};
use crate::config::schemas::{DEFAULT_ITERATIONS_LOG, DEFAULT_SAVE_EPOCHS};
use crate::config::{LoaderConfig, TrainTaskConfig};
use crate::datasets::{
    ClassificationBatch, ImageBatcher, ImageDataset, LoadedDataset, SequenceBatcher,
    SequenceDataset,
};
use crate::error::{Error, Result};
use crate::inference::{evaluate_model, scalar};
use crate::metrics::MetricReport;
use crate::models::{Architecture, Classifier, ModelInput, ModelSpec};

/// Batches of rank-`D` inputs on backend `B`
pub type BatchLoader<B, const D: usize> = Arc<dyn DataLoader<B, ClassificationBatch<B, D>>>;

/// Epoch and checkpoint settings of a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    pub epochs: usize,
    pub save_epochs: usize,
    pub iterations_log: usize,
    pub model_directory: PathBuf,
    pub run_id: Option<String>,
    pub resume_model: Option<PathBuf>,
}

impl TrainOptions {
    pub fn new(epochs: usize, model_directory: impl Into<PathBuf>) -> Self {
        Self {
            epochs,
            save_epochs: DEFAULT_SAVE_EPOCHS,
            iterations_log: DEFAULT_ITERATIONS_LOG,
            model_directory: model_directory.into(),
            run_id: None,
            resume_model: None,
        }
    }
}

impl From<&TrainTaskConfig> for TrainOptions {
    fn from(config: &TrainTaskConfig) -> Self {
        Self {
            epochs: config.epochs,
            save_epochs: config.save_epochs,
            iterations_log: config.iterations_log,
            model_directory: config.model_directory.clone(),
            run_id: config.id.clone(),
            resume_model: config.resume_model.clone(),
        }
    }
}

/// Result of a training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainSummary {
    pub run_id: String,
    /// Completed epochs, including those of a resumed run
    pub epochs: usize,
    /// Mean training loss of the last epoch
    pub loss: f64,
    /// Last checkpoint written
    pub checkpoint: PathBuf,
    pub train: Option<MetricReport>,
    pub val: Option<MetricReport>,
}

/// Loaders used by [`fit`]
pub struct FitLoaders<B: AutodiffBackend, const D: usize> {
    /// Shuffled training batches (autodiff backend)
    pub train: BatchLoader<B, D>,
    /// Training set again, in order, for per-epoch metrics
    pub train_eval: BatchLoader<B::InnerBackend, D>,
    pub val: Option<BatchLoader<B::InnerBackend, D>>,
}

// ---------------------------------------------------------------------------
// loaders
// ---------------------------------------------------------------------------

/// Training loaders shuffle (when configured) and use `num_workers`
/// threads; evaluation loaders read in dataset order on the calling thread.
fn build_loader<B, I, O, T, D>(batcher: T, dataset: D, config: &LoaderConfig, train: bool) -> Arc<dyn DataLoader<B, O>>
where
    B: Backend,
    T: Batcher<B, I, O> + 'static,
    D: Dataset<I> + 'static,
    I: Send + Sync + Clone + std::fmt::Debug + 'static,
    O: Send + Clone + std::fmt::Debug + 'static,
{
    let mut builder = DataLoaderBuilder::new(batcher).batch_size(config.batch_size.max(1));
    if train {
        if config.num_workers > 0 {
            builder = builder.num_workers(config.num_workers);
        }
        if config.shuffle {
            builder = builder.shuffle(config.seed);
        }
    }
    builder.build(dataset)
}

pub fn image_loader<B: Backend>(
    dataset: &ImageDataset,
    image_size: usize,
    num_classes: usize,
    device: &B::Device,
    train: bool,
) -> BatchLoader<B, 4> {
    let batcher = ImageBatcher::<B>::new(device.clone(), image_size, num_classes);
    build_loader(batcher, dataset.clone(), dataset.loader_config(), train)
}

pub fn sequence_loader<B: Backend>(
    dataset: &SequenceDataset,
    num_classes: usize,
    device: &B::Device,
    train: bool,
) -> BatchLoader<B, 3> {
    let batcher = SequenceBatcher::<B>::new(
        device.clone(),
        dataset.sequence_length(),
        dataset.input_dim(),
        num_classes,
    );
    build_loader(batcher, dataset.clone(), dataset.loader_config(), train)
}

/// Check that a model can consume a dataset
pub fn check_compatibility(spec: &ModelSpec, dataset: &LoadedDataset) -> Result<()> {
    let incompatible = |msg: String| Error::Incompatible {
        model: spec.class_spec.classname.clone(),
        dataset: dataset.describe(),
        msg,
    };

    match (spec.input(), dataset) {
        (ModelInput::Image { .. }, LoadedDataset::Image(_)) => {}
        (
            ModelInput::Sequence {
                sequence_length,
                input_dim,
            },
            LoadedDataset::Sequence(ds),
        ) => {
            if ds.sequence_length() != sequence_length || ds.input_dim() != input_dim {
                return Err(incompatible(format!(
                    "model expects {sequence_length} steps x {input_dim} bands"
                )));
            }
        }
        (ModelInput::Image { .. }, LoadedDataset::Sequence(_)) => {
            return Err(incompatible("image models need an image dataset".into()))
        }
        (ModelInput::Sequence { .. }, LoadedDataset::Image(_)) => {
            return Err(incompatible(
                "time-series models need a time-series dataset".into(),
            ))
        }
    }

    let labels = dataset.as_labeled();
    if labels.labels().len() != spec.num_classes() {
        return Err(incompatible(format!(
            "dataset has {} labels, model has {} classes",
            labels.labels().len(),
            spec.num_classes()
        )));
    }
    if labels.is_multilabel() && !spec.mode().is_multilabel() {
        return Err(incompatible(
            "multi-label data needs a multi-label model".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// metrics log
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MetricsRow<'a> {
    epoch: usize,
    split: &'a str,
    loss: f64,
    metric: &'a str,
    micro: f64,
    #[serde(rename = "macro")]
    macro_avg: f64,
    weighted: f64,
}

/// Append one epoch's scores to `metrics.csv`
fn append_metrics(
    path: &Path,
    epoch: usize,
    split: &str,
    loss: f64,
    report: &MetricReport,
) -> Result<()> {
    let is_new = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    for (metric, score) in &report.scores {
        writer
            .serialize(MetricsRow {
                epoch,
                split,
                loss,
                metric,
                micro: score.micro,
                macro_avg: score.macro_avg,
                weighted: score.weighted,
            })
            .map_err(|e| Error::csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}

// ---------------------------------------------------------------------------
// fit
// ---------------------------------------------------------------------------

/// Whether the 0-based `epoch` ends with a checkpoint; the first epoch
/// always does.
fn saves_after(epoch: usize, save_epochs: usize) -> bool {
    epoch % save_epochs.max(1) == 0
}

struct RunState {
    run_id: String,
    start: String,
    start_epoch: usize,
}

/// Train `model` for `options.epochs` epochs.
///
/// Returns the trained model and a summary. With `resume_model` set the
/// weights, optimizer state, epoch counter and run id come from that
/// checkpoint.
pub fn fit<B, M, const D: usize>(
    model: M,
    loaders: FitLoaders<B, D>,
    spec: &ModelSpec,
    labels: &[String],
    options: &TrainOptions,
    device: &B::Device,
) -> Result<(M, TrainSummary)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B, D>,
    M::InnerModule: Classifier<B::InnerBackend, D>,
{
    let mode = spec.mode();
    let metrics = spec.metrics()?;
    let weights = spec.loss_weights();
    let num_classes = spec.num_classes();
    let save_epochs = options.save_epochs.max(1);
    let iterations_log = options.iterations_log.max(1);

    let mut model = model;
    let mut optim = AdamConfig::new().init::<B, M>();

    let state = match &options.resume_model {
        Some(path) => {
            let checkpoint = checkpoint::load_checkpoint(path)?;
            let saved = ModelSpec::from_class_spec(&checkpoint.metadata.model)?;
            if !saved.same_layout(spec) {
                return Err(Error::Incompatible {
                    model: spec.class_spec.classname.clone(),
                    dataset: format!("checkpoint {}", path.display()),
                    msg: format!(
                        "checkpoint weights were built from {:?}, not {:?}",
                        saved.architecture, spec.architecture
                    ),
                });
            }
            if checkpoint.metadata.labels != labels {
                tracing::warn!(
                    checkpoint = ?checkpoint.metadata.labels,
                    dataset = ?labels,
                    "resumed checkpoint was trained with different labels"
                );
            }
            model = checkpoint::decode_module::<B, M>(model, checkpoint.model, device)?;
            match checkpoint.optimizer {
                Some(bytes) => {
                    optim = optim.load_record(checkpoint::decode_record::<B, _>(bytes, device)?)
                }
                None => tracing::warn!("checkpoint has no optimizer state, starting Adam fresh"),
            }
            tracing::info!(
                path = %path.display(),
                epoch = checkpoint.metadata.epoch,
                run_id = %checkpoint.metadata.run_id,
                "resuming training"
            );
            RunState {
                run_id: checkpoint.metadata.run_id,
                start: checkpoint.metadata.start,
                start_epoch: checkpoint.metadata.epoch,
            }
        }
        None => {
            let now = chrono::Local::now();
            RunState {
                run_id: options
                    .run_id
                    .clone()
                    .unwrap_or_else(|| now.format("%Y-%m-%d_%H-%M-%S").to_string()),
                start: now.to_rfc3339(),
                start_epoch: 0,
            }
        }
    };

    let run_dir = options.model_directory.join(&state.run_id);
    std::fs::create_dir_all(&run_dir).map_err(|e| Error::io(&run_dir, e))?;
    let metrics_path = run_dir.join("metrics.csv");

    tracing::info!(
        run_id = %state.run_id,
        epochs = options.epochs,
        start_epoch = state.start_epoch,
        learning_rate = spec.common.learning_rate,
        train_samples = loaders.train.num_items(),
        "training started"
    );

    let mut summary = TrainSummary {
        run_id: state.run_id.clone(),
        epochs: state.start_epoch,
        loss: 0.0,
        checkpoint: options
            .resume_model
            .clone()
            .unwrap_or_else(|| options.model_directory.join(checkpoint::LATEST_CHECKPOINT)),
        train: None,
        val: None,
    };
    let mut saved_epoch = options.resume_model.as_ref().map(|_| state.start_epoch);

    let save = |model: &M, optim_bytes: Vec<u8>, epoch: usize, loss: f64| -> Result<PathBuf> {
        let metadata = CheckpointMetadata::new(
            epoch,
            loss,
            state.start.clone(),
            state.run_id.clone(),
            labels.to_vec(),
            spec.class_spec.clone(),
        );
        let checkpoint = Checkpoint {
            metadata,
            model: checkpoint::encode_module::<B, M>(model)?,
            optimizer: Some(optim_bytes),
        };
        checkpoint::save_checkpoint(&options.model_directory, &checkpoint)
    };

    for epoch in state.start_epoch..options.epochs {
        let completed = epoch + 1;
        let mut running_loss = 0.0;
        let mut epoch_loss = 0.0;
        let mut seen = 0usize;
        let learning_rate = spec.common.learning_rate_at(epoch);
        tracing::debug!(epoch = completed, learning_rate, "epoch started");

        for (iteration, batch) in loaders.train.iter().enumerate() {
            let batch_size = batch.label_sets.len();
            let logits = model.forward(batch.inputs);
            let loss = mode.loss(logits, batch.targets, batch.multi_hot, weights);
            let loss_value = scalar(loss.clone());

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(learning_rate, model, grads);

            running_loss += loss_value;
            epoch_loss += loss_value * batch_size as f64;
            seen += batch_size;
            if (iteration + 1) % iterations_log == 0 {
                tracing::info!(
                    epoch = completed,
                    iteration = iteration + 1,
                    loss = running_loss / iterations_log as f64,
                    "training"
                );
                running_loss = 0.0;
            }
        }
        let epoch_loss = if seen == 0 { 0.0 } else { epoch_loss / seen as f64 };
        summary.epochs = completed;
        summary.loss = epoch_loss;

        if saves_after(epoch, save_epochs) {
            let optim_bytes = checkpoint::encode_record::<B, _>(optim.to_record())?;
            summary.checkpoint = save(&model, optim_bytes, completed, epoch_loss)?;
            saved_epoch = Some(completed);
        }

        let valid = model.valid();
        let train_eval = evaluate_model(&valid, &*loaders.train_eval, mode, weights, num_classes)?;
        let report = train_eval.score.get_scores(&metrics);
        tracing::info!(epoch = completed, loss = epoch_loss, "train {report}");
        append_metrics(&metrics_path, completed, "train", train_eval.loss, &report)?;
        summary.train = Some(report);

        if let Some(val_loader) = &loaders.val {
            let val = evaluate_model(&valid, &**val_loader, mode, weights, num_classes)?;
            let report = val.score.get_scores(&metrics);
            tracing::info!(epoch = completed, loss = val.loss, "val {report}");
            append_metrics(&metrics_path, completed, "val", val.loss, &report)?;
            summary.val = Some(report);
        }
    }

    if saved_epoch != Some(summary.epochs) {
        let optim_bytes = checkpoint::encode_record::<B, _>(optim.to_record())?;
        summary.checkpoint = save(&model, optim_bytes, summary.epochs, summary.loss)?;
    }

    tracing::info!(
        run_id = %summary.run_id,
        epochs = summary.epochs,
        loss = summary.loss,
        checkpoint = %summary.checkpoint.display(),
        "training finished"
    );
    Ok((model, summary))
}

// ---------------------------------------------------------------------------
// entry points
// ---------------------------------------------------------------------------

fn image_dataset<'a>(spec: &ModelSpec, dataset: &'a LoadedDataset) -> Result<&'a ImageDataset> {
    dataset.as_image().ok_or_else(|| Error::Incompatible {
        model: spec.class_spec.classname.clone(),
        dataset: dataset.describe(),
        msg: "image models need an image dataset".into(),
    })
}

fn sequence_dataset<'a>(
    spec: &ModelSpec,
    dataset: &'a LoadedDataset,
) -> Result<&'a SequenceDataset> {
    dataset.as_sequence().ok_or_else(|| Error::Incompatible {
        model: spec.class_spec.classname.clone(),
        dataset: dataset.describe(),
        msg: "time-series models need a time-series dataset".into(),
    })
}

/// Build the model `spec` names and train it on `train`, validating on `val`
/// after every epoch when given.
pub fn train_and_evaluate_model<B: AutodiffBackend>(
    spec: &ModelSpec,
    train: &LoadedDataset,
    val: Option<&LoadedDataset>,
    options: &TrainOptions,
    device: &B::Device,
) -> Result<TrainSummary> {
    check_compatibility(spec, train)?;
    let labels = train.as_labeled().labels().to_vec();
    if let Some(val) = val {
        check_compatibility(spec, val)?;
        if val.as_labeled().labels() != labels.as_slice() {
            return Err(Error::Incompatible {
                model: spec.class_spec.classname.clone(),
                dataset: val.describe(),
                msg: "validation labels differ from training labels".into(),
            });
        }
    }
    let num_classes = spec.num_classes();

    match &spec.architecture {
        Architecture::SimpleCnn(config) => {
            let train_ds = image_dataset(spec, train)?;
            if train_ds.image_size() != config.image_size {
                tracing::warn!(
                    dataset = train_ds.image_size(),
                    model = config.image_size,
                    "image size differs, images are resized to the model input"
                );
            }
            let size = config.image_size;
            let loaders = FitLoaders {
                train: image_loader::<B>(train_ds, size, num_classes, device, true),
                train_eval: image_loader::<B::InnerBackend>(train_ds, size, num_classes, device, false),
                val: val
                    .map(|ds| {
                        image_dataset(spec, ds).map(|ds| {
                            image_loader::<B::InnerBackend>(ds, size, num_classes, device, false)
                        })
                    })
                    .transpose()?,
            };
            let model = config.init::<B>(device)?;
            fit(model, loaders, spec, &labels, options, device).map(|(_, summary)| summary)
        }
        Architecture::TempCnn(config) => {
            let train_ds = sequence_dataset(spec, train)?;
            let loaders = FitLoaders {
                train: sequence_loader::<B>(train_ds, num_classes, device, true),
                train_eval: sequence_loader::<B::InnerBackend>(train_ds, num_classes, device, false),
                val: val
                    .map(|ds| {
                        sequence_dataset(spec, ds).map(|ds| {
                            sequence_loader::<B::InnerBackend>(ds, num_classes, device, false)
                        })
                    })
                    .transpose()?,
            };
            let model = config.init::<B>(device)?;
            fit(model, loaders, spec, &labels, options, device).map(|(_, summary)| summary)
        }
    }
}

/// Train without validation
pub fn train_model<B: AutodiffBackend>(
    spec: &ModelSpec,
    train: &LoadedDataset,
    options: &TrainOptions,
    device: &B::Device,
) -> Result<TrainSummary> {
    train_and_evaluate_model::<B>(spec, train, None, options, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassSpec, DatasetCommon, LoaderConfig};
    use crate::datasets::{SequenceItem, SubsetFormat};
    use crate::TestAutodiffBackend;
    use serde_json::json;

    fn series(n: usize) -> LoadedDataset {
        let samples = (0..n)
            .map(|i| {
                let label = i % 2;
                let base = if label == 0 { -1.0 } else { 1.0 };
                SequenceItem {
                    values: vec![base; 8],
                    labels: vec![label],
                }
            })
            .collect();
        let common = DatasetCommon {
            loader: LoaderConfig {
                batch_size: 4,
                shuffle: true,
                num_workers: 0,
                seed: 1,
            },
            ..DatasetCommon::default()
        };
        LoadedDataset::Sequence(SequenceDataset::new(
            samples,
            vec!["wheat".into(), "maize".into()],
            4,
            2,
            common,
        ))
    }

    fn tempcnn_spec() -> ModelSpec {
        let config = json!({
            "num_classes": 2, "input_dim": 2, "sequence_length": 4,
            "hidden_dims": 4, "kernel_size": 3,
            "metrics": ["accuracy", "f1_score"]
        });
        ModelSpec::from_class_spec(&ClassSpec::new(
            "models.TempCnn",
            config.as_object().cloned().unwrap(),
        ))
        .unwrap()
    }

    #[test]
    fn test_train_options_from_task_config() {
        let config: TrainTaskConfig = serde_json::from_value(json!({
            "epochs": 7, "save_epochs": 2, "model_directory": "out", "id": "run",
            "train_dataset_config": {"classname": "TimeSeriesClassificationDataset"}
        }))
        .unwrap();
        let options = TrainOptions::from(&config);
        assert_eq!(options.epochs, 7);
        assert_eq!(options.save_epochs, 2);
        assert_eq!(options.run_id.as_deref(), Some("run"));
    }

    #[test]
    fn test_incompatible_pairs_rejected() {
        let image = LoadedDataset::Image(ImageDataset::new(
            vec![],
            vec!["a".into(), "b".into()],
            32,
            false,
            SubsetFormat::MultiClassCsv,
            DatasetCommon::default(),
        ));
        let err = check_compatibility(&tempcnn_spec(), &image).unwrap_err();
        assert!(matches!(err, Error::Incompatible { .. }));
        assert!(check_compatibility(&tempcnn_spec(), &series(4)).is_ok());

        let cnn = ModelSpec::from_class_spec(&ClassSpec::new(
            "SimpleCnn",
            json!({"num_classes": 3}).as_object().cloned().unwrap(),
        ))
        .unwrap();
        assert!(check_compatibility(&cnn, &series(4)).is_err());
        // label count mismatch
        assert!(check_compatibility(&cnn, &image).is_err());
    }

    #[test]
    fn test_fit_saves_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let spec = tempcnn_spec();
        let dataset = series(12);

        let mut options = TrainOptions::new(2, dir.path());
        options.save_epochs = 1;
        options.iterations_log = 1;
        options.run_id = Some("first".into());
        let summary =
            train_model::<TestAutodiffBackend>(&spec, &dataset, &options, &device).unwrap();
        assert_eq!(summary.epochs, 2);
        assert!(summary.loss.is_finite());
        assert!(summary.train.is_some());
        assert!(summary.val.is_none());
        assert!(dir.path().join("checkpoint.tar.gz").is_file());

        let metrics = std::fs::read_to_string(dir.path().join("first/metrics.csv")).unwrap();
        // header + 2 epochs x 2 metrics
        assert_eq!(metrics.lines().count(), 5);
        assert!(metrics.starts_with("epoch,split,loss,metric,micro,macro,weighted"));

        let mut resume = TrainOptions::new(3, dir.path());
        resume.resume_model = Some(dir.path().join("checkpoint.tar.gz"));
        let summary = train_and_evaluate_model::<TestAutodiffBackend>(
            &spec,
            &dataset,
            Some(&dataset),
            &resume,
            &device,
        )
        .unwrap();
        assert_eq!(summary.run_id, "first");
        assert_eq!(summary.epochs, 3);
        assert!(summary.val.is_some());

        let metadata = checkpoint::load_metadata(&summary.checkpoint).unwrap();
        assert_eq!(metadata.epoch, 3);
        assert_eq!(metadata.labels, vec!["wheat".to_string(), "maize".to_string()]);
    }

    #[test]
    fn test_save_cadence_counts_from_first_epoch() {
        let saved: Vec<usize> = (0..7).filter(|&e| saves_after(e, 3)).collect();
        assert_eq!(saved, vec![0, 3, 6]);
        assert!((0..4).all(|e| saves_after(e, 1)));
        assert!(saves_after(0, 0));
    }

    #[test]
    fn test_train_options_defaults_match_task_config() {
        let config: TrainTaskConfig = serde_json::from_value(json!({
            "epochs": 5, "model_directory": "out",
            "train_dataset_config": {"classname": "TimeSeriesClassificationDataset"}
        }))
        .unwrap();
        let from_config = TrainOptions::from(&config);
        let direct = TrainOptions::new(5, "out");
        assert_eq!(direct, from_config);
    }

    #[test]
    fn test_resume_rejects_different_architecture() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let dataset = series(8);

        let mut options = TrainOptions::new(1, dir.path());
        options.run_id = Some("narrow".into());
        train_model::<TestAutodiffBackend>(&tempcnn_spec(), &dataset, &options, &device).unwrap();

        let wider = ModelSpec::from_class_spec(&ClassSpec::new(
            "models.TempCnn",
            json!({
                "num_classes": 2, "input_dim": 2, "sequence_length": 4,
                "hidden_dims": 8, "kernel_size": 3
            })
            .as_object()
            .cloned()
            .unwrap(),
        ))
        .unwrap();
        let mut resume = TrainOptions::new(2, dir.path());
        resume.resume_model = Some(dir.path().join("checkpoint.tar.gz"));
        let err = train_model::<TestAutodiffBackend>(&wider, &dataset, &resume, &device).unwrap_err();
        assert!(matches!(err, Error::Incompatible { .. }));

        // nothing was written on top of the original checkpoint
        let metadata = checkpoint::load_metadata(&dir.path().join("checkpoint.tar.gz")).unwrap();
        assert_eq!(metadata.epoch, 1);
        assert_eq!(metadata.model.config["hidden_dims"], json!(4));
    }
}
