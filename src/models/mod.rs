//! Classification models and the loss / decision rule they train with.

pub mod cnn;
pub mod tempcnn;

pub use cnn::{SimpleCnn, SimpleCnnConfig};
pub use tempcnn::{TempCnn, TempCnnConfig};

use burn::{
    module::Module,
    nn::loss::{BinaryCrossEntropyLossConfig, CrossEntropyLossConfig},
    tensor::{activation, backend::Backend, Int, Tensor},
};

use crate::config::{ClassSpec, ModelCommon, SimpleCnnSettings, TempCnnSettings};
use crate::error::{Error, Result};
use crate::registry::{self, MetricKind, ModelKind};

/// A model mapping a batch of inputs of rank `D` to class logits
pub trait Classifier<B: Backend, const D: usize>: Module<B> {
    /// logits `[batch, num_classes]`
    fn forward(&self, inputs: Tensor<B, D>) -> Tensor<B, 2>;

    /// Penultimate-layer activations `[batch, features]`
    fn features(&self, inputs: Tensor<B, D>) -> Tensor<B, 2>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassificationMode {
    /// One label per sample, softmax + argmax
    MultiClass,
    /// Any number of labels per sample, sigmoid + threshold
    MultiLabel { threshold: f32 },
}

impl ClassificationMode {
    pub fn is_multilabel(&self) -> bool {
        matches!(self, ClassificationMode::MultiLabel { .. })
    }

    /// Mean loss of a batch.
    ///
    /// `weights` are per-class cross-entropy weights and are ignored in
    /// multi-label mode.
    pub fn loss<B: Backend>(
        &self,
        logits: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
        multi_hot: Tensor<B, 2, Int>,
        weights: Option<&[f32]>,
    ) -> Tensor<B, 1> {
        let device = logits.device();
        match self {
            ClassificationMode::MultiClass => CrossEntropyLossConfig::new()
                .with_weights(weights.map(<[f32]>::to_vec))
                .init(&device)
                .forward(logits, targets),
            ClassificationMode::MultiLabel { .. } => BinaryCrossEntropyLossConfig::new()
                .with_logits(true)
                .init(&device)
                .forward(logits, multi_hot),
        }
    }

    /// Class scores in `[0, 1]`
    pub fn probabilities<B: Backend>(&self, logits: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            ClassificationMode::MultiClass => activation::softmax(logits, 1),
            ClassificationMode::MultiLabel { .. } => activation::sigmoid(logits),
        }
    }

    /// Predicted label set from one row of probabilities
    pub fn decide(&self, probabilities: &[f32]) -> Vec<usize> {
        match self {
            ClassificationMode::MultiClass => probabilities
                .iter()
                .enumerate()
                .fold(None::<(usize, f32)>, |best, (i, &p)| match best {
                    Some((_, best_p)) if best_p >= p => best,
                    _ => Some((i, p)),
                })
                .map(|(i, _)| vec![i])
                .unwrap_or_default(),
            ClassificationMode::MultiLabel { threshold } => probabilities
                .iter()
                .enumerate()
                .filter(|(_, p)| **p >= *threshold)
                .map(|(i, _)| i)
                .collect(),
        }
    }
}

/// Network layout selected by a model spec
#[derive(Debug, Clone)]
pub enum Architecture {
    SimpleCnn(SimpleCnnConfig),
    TempCnn(TempCnnConfig),
}

/// What a model consumes, used to match it with a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelInput {
    Image { image_size: usize },
    Sequence { sequence_length: usize, input_dim: usize },
}

/// A model `{classname, config}` resolved into its architecture and
/// training settings
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub class_spec: ClassSpec,
    pub common: ModelCommon,
    pub architecture: Architecture,
}

impl ModelSpec {
    pub fn from_class_spec(spec: &ClassSpec) -> Result<Self> {
        let kind = registry::resolve_model(&spec.classname)?;
        let (common, architecture) = match kind {
            ModelKind::SimpleCnn | ModelKind::SimpleCnnMultiLabel => {
                let settings: SimpleCnnSettings = registry::instantiate(spec)?;
                let config = SimpleCnnConfig::new(settings.common.num_classes)
                    .with_image_size(settings.image_size)
                    .with_dropout(settings.dropout);
                (settings.common, Architecture::SimpleCnn(config))
            }
            ModelKind::TempCnn => {
                let settings: TempCnnSettings = registry::instantiate(spec)?;
                let config = TempCnnConfig::new(
                    settings.input_dim,
                    settings.sequence_length,
                    settings.common.num_classes,
                )
                .with_kernel_size(settings.kernel_size)
                .with_hidden_dims(settings.hidden_dims)
                .with_dropout(settings.dropout);
                (settings.common, Architecture::TempCnn(config))
            }
        };

        let invalid = |msg: String| Error::InvalidConfig {
            classname: spec.classname.clone(),
            msg,
        };
        if common.num_classes == 0 {
            return Err(invalid("num_classes must be positive".into()));
        }
        if let Some(weights) = &common.weights {
            if weights.len() != common.num_classes {
                return Err(invalid(format!(
                    "{} class weights given for {} classes",
                    weights.len(),
                    common.num_classes
                )));
            }
        }
        if !(0.0..=1.0).contains(&common.threshold) {
            return Err(invalid(format!(
                "threshold must be in [0, 1], got {}",
                common.threshold
            )));
        }
        registry::resolve_metrics(&common.metrics)?;

        Ok(Self {
            kind,
            class_spec: spec.clone(),
            common,
            architecture,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.common.num_classes
    }

    pub fn mode(&self) -> ClassificationMode {
        match self.kind {
            ModelKind::SimpleCnnMultiLabel => ClassificationMode::MultiLabel {
                threshold: self.common.threshold,
            },
            _ => ClassificationMode::MultiClass,
        }
    }

    pub fn input(&self) -> ModelInput {
        match &self.architecture {
            Architecture::SimpleCnn(cfg) => ModelInput::Image {
                image_size: cfg.image_size,
            },
            Architecture::TempCnn(cfg) => ModelInput::Sequence {
                sequence_length: cfg.sequence_length,
                input_dim: cfg.input_dim,
            },
        }
    }

    /// Metrics reported while training
    pub fn metrics(&self) -> Result<Vec<MetricKind>> {
        registry::resolve_metrics(&self.common.metrics)
    }

    /// Whether weights trained for `other` fit this model
    pub fn same_layout(&self, other: &ModelSpec) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match (&self.architecture, &other.architecture) {
            (Architecture::SimpleCnn(a), Architecture::SimpleCnn(b)) => {
                a.num_classes == b.num_classes && a.image_size == b.image_size
            }
            (Architecture::TempCnn(a), Architecture::TempCnn(b)) => {
                a.input_dim == b.input_dim
                    && a.sequence_length == b.sequence_length
                    && a.num_classes == b.num_classes
                    && a.kernel_size == b.kernel_size
                    && a.hidden_dims == b.hidden_dims
            }
            _ => false,
        }
    }

    /// Class weights for the loss, multi-class only
    pub fn loss_weights(&self) -> Option<&[f32]> {
        match self.mode() {
            ClassificationMode::MultiClass => self.common.weights.as_deref(),
            ClassificationMode::MultiLabel { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;
    use serde_json::json;

    fn spec(classname: &str, config: serde_json::Value) -> ClassSpec {
        ClassSpec {
            classname: classname.into(),
            config: config.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_decide_multiclass_takes_first_max() {
        let mode = ClassificationMode::MultiClass;
        assert_eq!(mode.decide(&[0.2, 0.5, 0.3]), vec![1]);
        assert_eq!(mode.decide(&[0.4, 0.4, 0.2]), vec![0]);
        assert!(mode.decide(&[]).is_empty());
    }

    #[test]
    fn test_decide_multilabel_threshold() {
        let mode = ClassificationMode::MultiLabel { threshold: 0.5 };
        assert_eq!(mode.decide(&[0.5, 0.49, 0.9]), vec![0, 2]);
        assert!(mode.decide(&[0.1, 0.2]).is_empty());
    }

    #[test]
    fn test_probabilities_sum_to_one_for_multiclass() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0]], &device);
        let probs: Vec<f32> = ClassificationMode::MultiClass
            .probabilities(logits)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_loss_is_scalar() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[2.0, -1.0], [0.0, 1.0]], &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([0, 1], &device);
        let multi_hot = Tensor::<TestBackend, 2, Int>::from_ints([[1, 0], [1, 1]], &device);

        let ce = ClassificationMode::MultiClass.loss(
            logits.clone(),
            targets.clone(),
            multi_hot.clone(),
            Some(&[1.0, 2.0]),
        );
        assert_eq!(ce.dims(), [1]);

        let bce = ClassificationMode::MultiLabel { threshold: 0.5 }.loss(
            logits, targets, multi_hot, None,
        );
        assert_eq!(bce.dims(), [1]);
    }

    #[test]
    fn test_model_spec_from_class_spec() {
        let model = ModelSpec::from_class_spec(&spec(
            "models.SimpleCnnMultiLabel",
            json!({"num_classes": 17, "image_size": 32, "threshold": 0.3}),
        ))
        .unwrap();
        assert_eq!(model.kind, ModelKind::SimpleCnnMultiLabel);
        assert_eq!(model.mode(), ClassificationMode::MultiLabel { threshold: 0.3 });
        assert_eq!(model.input(), ModelInput::Image { image_size: 32 });
        assert!(model.loss_weights().is_none());

        let model = ModelSpec::from_class_spec(&spec(
            "TempCNN",
            json!({"num_classes": 3, "input_dim": 13, "sequence_length": 45}),
        ))
        .unwrap();
        assert_eq!(model.mode(), ClassificationMode::MultiClass);
        assert_eq!(
            model.input(),
            ModelInput::Sequence { sequence_length: 45, input_dim: 13 }
        );
    }

    #[test]
    fn test_model_spec_rejects_bad_settings() {
        let bad_weights = spec("SimpleCnn", json!({"num_classes": 3, "weights": [1.0]}));
        assert!(ModelSpec::from_class_spec(&bad_weights).is_err());

        let bad_metric = spec("SimpleCnn", json!({"num_classes": 3, "metrics": ["auc"]}));
        assert!(ModelSpec::from_class_spec(&bad_metric).is_err());

        let unknown_key = spec("SimpleCnn", json!({"num_classes": 3, "in_channels": 4}));
        assert!(ModelSpec::from_class_spec(&unknown_key).is_err());
    }

    #[test]
    fn test_same_layout_ignores_training_settings() {
        let base = json!({"num_classes": 3, "input_dim": 2, "sequence_length": 8, "hidden_dims": 4});
        let a = ModelSpec::from_class_spec(&spec("TempCnn", base.clone())).unwrap();

        let mut tuned = base.clone();
        tuned["learning_rate"] = json!(0.1);
        tuned["dropout"] = json!(0.2);
        let b = ModelSpec::from_class_spec(&spec("TempCnn", tuned)).unwrap();
        assert!(a.same_layout(&b));

        let mut wider = base;
        wider["hidden_dims"] = json!(8);
        let c = ModelSpec::from_class_spec(&spec("TempCnn", wider)).unwrap();
        assert!(!a.same_layout(&c));

        let cnn = ModelSpec::from_class_spec(&spec("SimpleCnn", json!({"num_classes": 3}))).unwrap();
        let multilabel =
            ModelSpec::from_class_spec(&spec("SimpleCnnMultiLabel", json!({"num_classes": 3})))
                .unwrap();
        assert!(!a.same_layout(&cnn));
        assert!(!cnn.same_layout(&multilabel));
    }
}
