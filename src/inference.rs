//! Evaluation and prediction with trained models.

use burn::{
    data::dataloader::DataLoader,
    tensor::{backend::Backend, Tensor},
};
use std::path::Path;

use crate::checkpoint::{self, CheckpointMetadata};
use crate::datasets::image_io::{load_and_normalize_image, IMAGE_CHANNELS};
use crate::datasets::{ClassificationBatch, LoadedDataset};
use crate::error::{Error, Result};
use crate::metrics::RunningScore;
use crate::models::{
    Architecture, ClassificationMode, Classifier, ModelInput, ModelSpec, SimpleCnn, TempCnn,
};
use crate::training::{check_compatibility, image_loader, sequence_loader};

/// Mean loss and filled confusion counts of one pass over a loader
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub loss: f64,
    pub score: RunningScore,
}

/// Model output for one sample
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub truth: Vec<usize>,
    pub predicted: Vec<usize>,
    pub probabilities: Vec<f32>,
}

/// Penultimate-layer activations of one sample
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub truth: Vec<usize>,
    pub features: Vec<f32>,
}

/// First value of a one-element tensor
pub(crate) fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .unwrap_or_default()
        .first()
        .copied()
        .unwrap_or(0.0)
}

fn probability_rows<B: Backend>(
    mode: ClassificationMode,
    logits: Tensor<B, 2>,
) -> Result<Vec<Vec<f32>>> {
    let [_, classes] = logits.dims();
    let values = mode
        .probabilities(logits)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::Other(format!("reading model output: {e:?}")))?;
    Ok(values.chunks(classes.max(1)).map(<[f32]>::to_vec).collect())
}

/// Run `model` over every batch of `loader`
pub fn evaluate_model<B: Backend, M: Classifier<B, D>, const D: usize>(
    model: &M,
    loader: &dyn DataLoader<B, ClassificationBatch<B, D>>,
    mode: ClassificationMode,
    weights: Option<&[f32]>,
    num_classes: usize,
) -> Result<Evaluation> {
    let mut score = RunningScore::new(num_classes);
    let mut total_loss = 0.0;
    let mut seen = 0usize;

    for batch in loader.iter() {
        let batch_size = batch.label_sets.len();
        let logits = model.forward(batch.inputs);
        let loss = mode.loss(logits.clone(), batch.targets, batch.multi_hot, weights);
        total_loss += scalar(loss) * batch_size as f64;
        seen += batch_size;

        let predicted: Vec<Vec<usize>> = probability_rows(mode, logits)?
            .iter()
            .map(|row| mode.decide(row))
            .collect();
        score.update(&batch.label_sets, &predicted);
    }

    Ok(Evaluation {
        loss: if seen == 0 { 0.0 } else { total_loss / seen as f64 },
        score,
    })
}

/// Per-sample predictions, in loader order
pub fn predict<B: Backend, M: Classifier<B, D>, const D: usize>(
    model: &M,
    loader: &dyn DataLoader<B, ClassificationBatch<B, D>>,
    mode: ClassificationMode,
) -> Result<Vec<Prediction>> {
    let mut predictions = Vec::with_capacity(loader.num_items());
    for batch in loader.iter() {
        let logits = model.forward(batch.inputs);
        for (truth, probabilities) in batch
            .label_sets
            .into_iter()
            .zip(probability_rows(mode, logits)?)
        {
            predictions.push(Prediction {
                truth,
                predicted: mode.decide(&probabilities),
                probabilities,
            });
        }
    }
    Ok(predictions)
}

/// Per-sample features, in loader order
pub fn extract_features<B: Backend, M: Classifier<B, D>, const D: usize>(
    model: &M,
    loader: &dyn DataLoader<B, ClassificationBatch<B, D>>,
) -> Result<Vec<FeatureRow>> {
    let mut rows = Vec::with_capacity(loader.num_items());
    for batch in loader.iter() {
        let features = model.features(batch.inputs);
        let [_, width] = features.dims();
        let values = features
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| Error::Other(format!("reading model features: {e:?}")))?;
        for (truth, features) in batch
            .label_sets
            .into_iter()
            .zip(values.chunks(width.max(1)))
        {
            rows.push(FeatureRow {
                truth,
                features: features.to_vec(),
            });
        }
    }
    Ok(rows)
}

/// Network restored from a checkpoint
#[derive(Debug)]
pub enum TrainedModel<B: Backend> {
    SimpleCnn(SimpleCnn<B>),
    TempCnn(TempCnn<B>),
}

/// A checkpoint loaded for evaluation or prediction
#[derive(Debug)]
pub struct LoadedModel<B: Backend> {
    pub spec: ModelSpec,
    pub metadata: CheckpointMetadata,
    pub model: TrainedModel<B>,
    device: B::Device,
}

impl<B: Backend> LoadedModel<B> {
    pub fn load(path: &Path, device: &B::Device) -> Result<Self> {
        let checkpoint = checkpoint::load_checkpoint(path)?;
        let spec = ModelSpec::from_class_spec(&checkpoint.metadata.model)?;
        let model = match &spec.architecture {
            Architecture::SimpleCnn(config) => TrainedModel::SimpleCnn(
                checkpoint::decode_module::<B, _>(config.init::<B>(device)?, checkpoint.model, device)?,
            ),
            Architecture::TempCnn(config) => TrainedModel::TempCnn(
                checkpoint::decode_module::<B, _>(config.init::<B>(device)?, checkpoint.model, device)?,
            ),
        };
        tracing::info!(
            path = %path.display(),
            model = %spec.class_spec.classname,
            epoch = checkpoint.metadata.epoch,
            "model loaded"
        );
        Ok(Self {
            spec,
            metadata: checkpoint.metadata,
            model,
            device: device.clone(),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.metadata.labels
    }

    fn mismatch(&self, dataset: &LoadedDataset) -> Error {
        Error::Incompatible {
            model: self.spec.class_spec.classname.clone(),
            dataset: dataset.describe(),
            msg: "model and dataset inputs differ".into(),
        }
    }

    fn check(&self, dataset: &LoadedDataset) -> Result<()> {
        check_compatibility(&self.spec, dataset)?;
        if dataset.as_labeled().labels() != self.labels() {
            tracing::warn!(
                model = ?self.labels(),
                dataset = ?dataset.as_labeled().labels(),
                "dataset labels differ from the labels the model was trained with"
            );
        }
        Ok(())
    }

    pub fn evaluate(&self, dataset: &LoadedDataset) -> Result<Evaluation> {
        self.check(dataset)?;
        let mode = self.spec.mode();
        let weights = self.spec.loss_weights();
        let n = self.spec.num_classes();
        match (&self.model, dataset, self.spec.input()) {
            (TrainedModel::SimpleCnn(model), LoadedDataset::Image(ds), ModelInput::Image { image_size }) => {
                let loader = image_loader::<B>(ds, image_size, n, &self.device, false);
                evaluate_model(model, &*loader, mode, weights, n)
            }
            (TrainedModel::TempCnn(model), LoadedDataset::Sequence(ds), _) => {
                let loader = sequence_loader::<B>(ds, n, &self.device, false);
                evaluate_model(model, &*loader, mode, weights, n)
            }
            _ => Err(self.mismatch(dataset)),
        }
    }

    pub fn predict(&self, dataset: &LoadedDataset) -> Result<Vec<Prediction>> {
        self.check(dataset)?;
        let mode = self.spec.mode();
        let n = self.spec.num_classes();
        match (&self.model, dataset, self.spec.input()) {
            (TrainedModel::SimpleCnn(model), LoadedDataset::Image(ds), ModelInput::Image { image_size }) => {
                let loader = image_loader::<B>(ds, image_size, n, &self.device, false);
                predict(model, &*loader, mode)
            }
            (TrainedModel::TempCnn(model), LoadedDataset::Sequence(ds), _) => {
                let loader = sequence_loader::<B>(ds, n, &self.device, false);
                predict(model, &*loader, mode)
            }
            _ => Err(self.mismatch(dataset)),
        }
    }

    pub fn features(&self, dataset: &LoadedDataset) -> Result<Vec<FeatureRow>> {
        check_compatibility(&self.spec, dataset)?;
        let n = self.spec.num_classes();
        match (&self.model, dataset, self.spec.input()) {
            (TrainedModel::SimpleCnn(model), LoadedDataset::Image(ds), ModelInput::Image { image_size }) => {
                let loader = image_loader::<B>(ds, image_size, n, &self.device, false);
                extract_features(model, &*loader)
            }
            (TrainedModel::TempCnn(model), LoadedDataset::Sequence(ds), _) => {
                let loader = sequence_loader::<B>(ds, n, &self.device, false);
                extract_features(model, &*loader)
            }
            _ => Err(self.mismatch(dataset)),
        }
    }

    /// Predict one image file; `truth` is left empty
    pub fn predict_image(&self, path: &Path) -> Result<Prediction> {
        let (TrainedModel::SimpleCnn(model), ModelInput::Image { image_size }) =
            (&self.model, self.spec.input())
        else {
            return Err(Error::Incompatible {
                model: self.spec.class_spec.classname.clone(),
                dataset: path.display().to_string(),
                msg: "single-image prediction needs an image model".into(),
            });
        };
        let pixels = load_and_normalize_image(path, image_size)?;
        let inputs = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([1, IMAGE_CHANNELS, image_size, image_size]);

        let mode = self.spec.mode();
        let probabilities = probability_rows(mode, model.forward(inputs))?
            .into_iter()
            .next()
            .unwrap_or_default();
        Ok(Prediction {
            truth: Vec::new(),
            predicted: mode.decide(&probabilities),
            probabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassSpec, DatasetCommon, LoaderConfig};
    use crate::datasets::{SequenceDataset, SequenceItem};
    use crate::models::TempCnnConfig;
    use crate::registry::MetricKind;
    use crate::training::sequence_loader;
    use crate::TestBackend;
    use serde_json::json;

    fn dataset() -> SequenceDataset {
        let samples = (0..5)
            .map(|i| SequenceItem {
                values: vec![i as f32; 6],
                labels: vec![i % 3],
            })
            .collect();
        SequenceDataset::new(
            samples,
            vec!["a".into(), "b".into(), "c".into()],
            3,
            2,
            DatasetCommon {
                loader: LoaderConfig {
                    batch_size: 2,
                    shuffle: false,
                    num_workers: 0,
                    seed: 0,
                },
                ..DatasetCommon::default()
            },
        )
    }

    #[test]
    fn test_scalar() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 1>::from_floats([2.5], &device);
        assert_eq!(scalar(t), 2.5);
    }

    #[test]
    fn test_evaluate_counts_every_sample() {
        let device = Default::default();
        let model = TempCnnConfig::new(2, 3, 3)
            .with_hidden_dims(4)
            .with_kernel_size(3)
            .init::<TestBackend>(&device)
            .unwrap();
        let loader = sequence_loader::<TestBackend>(&dataset(), 3, &device, false);

        let evaluation =
            evaluate_model(&model, &*loader, ClassificationMode::MultiClass, None, 3).unwrap();
        assert_eq!(evaluation.score.samples(), 5);
        assert!(evaluation.loss.is_finite() && evaluation.loss > 0.0);
        let report = evaluation.score.get_scores(&[MetricKind::Accuracy]);
        assert!((0.0..=1.0).contains(&report.scores[0].1.micro));
    }

    #[test]
    fn test_predict_keeps_order_and_shapes() {
        let device = Default::default();
        let model = TempCnnConfig::new(2, 3, 3)
            .with_hidden_dims(4)
            .with_kernel_size(3)
            .init::<TestBackend>(&device)
            .unwrap();
        let loader = sequence_loader::<TestBackend>(&dataset(), 3, &device, false);

        let predictions = predict(&model, &*loader, ClassificationMode::MultiClass).unwrap();
        assert_eq!(predictions.len(), 5);
        let truths: Vec<Vec<usize>> = predictions.iter().map(|p| p.truth.clone()).collect();
        assert_eq!(truths, vec![vec![0], vec![1], vec![2], vec![0], vec![1]]);
        for p in &predictions {
            assert_eq!(p.probabilities.len(), 3);
            assert_eq!(p.predicted.len(), 1);
        }
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoadedModel::<TestBackend>::load(&dir.path().join("x.tar.gz"), &Default::default())
            .unwrap_err();
        assert!(matches!(err, Error::CheckpointNotFound(_)));
    }

    fn simple_cnn_checkpoint(dir: &Path) -> std::path::PathBuf {
        let device = Default::default();
        let config = json!({"num_classes": 3, "image_size": 18});
        let spec = ClassSpec::new("SimpleCnn", config.as_object().cloned().unwrap());
        let model = crate::models::SimpleCnnConfig::new(3)
            .with_image_size(18)
            .init::<TestBackend>(&device)
            .unwrap();
        let checkpoint = checkpoint::Checkpoint {
            metadata: CheckpointMetadata::new(
                1,
                0.0,
                "start".into(),
                "run".into(),
                vec!["a".into(), "b".into(), "c".into()],
                spec,
            ),
            model: checkpoint::encode_module::<TestBackend, _>(&model).unwrap(),
            optimizer: None,
        };
        let path = dir.join("model.tar.gz");
        checkpoint::write_checkpoint(&path, &checkpoint).unwrap();
        path
    }

    #[test]
    fn test_loaded_model_rejects_wrong_dataset_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = simple_cnn_checkpoint(dir.path());

        let loaded = LoadedModel::<TestBackend>::load(&path, &Default::default()).unwrap();
        assert_eq!(loaded.labels().len(), 3);
        let err = loaded
            .evaluate(&LoadedDataset::Sequence(dataset()))
            .unwrap_err();
        assert!(matches!(err, Error::Incompatible { .. }));
        let err = loaded
            .features(&LoadedDataset::Sequence(dataset()))
            .unwrap_err();
        assert!(matches!(err, Error::Incompatible { .. }));
    }

    #[test]
    fn test_predict_single_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = simple_cnn_checkpoint(dir.path());
        let image = dir.path().join("tile.png");
        image::RgbImage::from_pixel(32, 24, image::Rgb([40, 120, 200]))
            .save(&image)
            .unwrap();

        let loaded = LoadedModel::<TestBackend>::load(&path, &Default::default()).unwrap();
        let prediction = loaded.predict_image(&image).unwrap();
        assert!(prediction.truth.is_empty());
        assert_eq!(prediction.predicted.len(), 1);
        assert_eq!(prediction.probabilities.len(), 3);
        let total: f32 = prediction.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);

        let err = loaded.predict_image(&dir.path().join("missing.png")).unwrap_err();
        assert!(matches!(err, Error::Image { .. }));
    }

    #[test]
    fn test_extract_features_per_sample() {
        let device = Default::default();
        let model = TempCnnConfig::new(2, 3, 3)
            .with_hidden_dims(4)
            .with_kernel_size(3)
            .init::<TestBackend>(&device)
            .unwrap();
        let loader = sequence_loader::<TestBackend>(&dataset(), 3, &device, false);

        let rows = extract_features(&model, &*loader).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4].truth, vec![1]);
        for row in &rows {
            assert_eq!(row.features.len(), 16);
            // ReLU output
            assert!(row.features.iter().all(|v| *v >= 0.0));
        }
    }
}
