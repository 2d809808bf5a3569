//! Small convolutional image classifier.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::Classifier;
use crate::datasets::image_io::IMAGE_CHANNELS;
use crate::error::Error;

/// Model config
#[derive(Config, Debug)]
pub struct SimpleCnnConfig {
    /// Number of output classes
    pub num_classes: usize,
    /// Dropout before the classifier head
    #[config(default = 0.5)]
    pub dropout: f64,
    /// Input image size (square)
    #[config(default = 64)]
    pub image_size: usize,
}

impl SimpleCnnConfig {
    /// Side of the last feature map.
    ///
    /// Each unpadded 3x3 conv shrinks the side by 2, each 2x2 pool halves it
    /// (rounding down): conv, pool, conv, pool, conv.
    pub fn feature_map_size(&self) -> usize {
        let after_conv1 = self.image_size.saturating_sub(2);
        let after_pool1 = after_conv1 / 2;
        let after_conv2 = after_pool1.saturating_sub(2);
        let after_pool2 = after_conv2 / 2;
        after_pool2.saturating_sub(2)
    }

    /// Build the model
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<SimpleCnn<B>> {
        let feature_map_size = self.feature_map_size();
        if feature_map_size == 0 {
            return Err(Error::Other(format!(
                "image_size {} is too small for SimpleCnn (minimum 18)",
                self.image_size
            )));
        }
        if self.num_classes == 0 {
            return Err(Error::Other("num_classes must be positive".into()));
        }

        // d = 128 channels * feature_map_size^2
        let d = 128 * feature_map_size * feature_map_size;
        let d_half = (d / 2).max(self.num_classes);
        tracing::debug!(
            image_size = self.image_size,
            feature_map_size,
            features = d,
            "SimpleCnn layout"
        );

        Ok(SimpleCnn {
            conv1: Conv2dConfig::new([IMAGE_CHANNELS, 32], [3, 3]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).init(),
            conv2: Conv2dConfig::new([32, 64], [3, 3]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).init(),
            conv3: Conv2dConfig::new([64, 128], [3, 3]).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc1: LinearConfig::new(d, d_half).init(device),
            fc2: LinearConfig::new(d_half, self.num_classes).init(device),
            activation: Relu::new(),
        })
    }
}

/// Image classification CNN
///
/// # Architecture
/// - {Conv 3x3 (no padding) + ReLU + MaxPool 2x2} x 2
/// - Conv 3x3 (no padding) + ReLU
/// - Flatten, Dropout
/// - FC: d -> d/2 + ReLU
/// - FC: d/2 -> num_classes (logits)
#[derive(Module, Debug)]
pub struct SimpleCnn<B: Backend> {
    conv1: Conv2d<B>, // 3 -> 32
    pool1: MaxPool2d,
    conv2: Conv2d<B>, // 32 -> 64
    pool2: MaxPool2d,
    conv3: Conv2d<B>, // 64 -> 128
    dropout: Dropout,
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> SimpleCnn<B> {
    /// # Arguments
    /// - `images`: `[batch_size, 3, size, size]`
    ///
    /// # Returns
    /// - logits `[batch_size, num_classes]`
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.fc2.forward(self.features(images))
    }

    /// Output of the hidden FC layer, `[batch_size, d/2]`
    pub fn features(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.conv1.forward(images);
        let x = self.activation.forward(x);
        let x = self.pool1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.activation.forward(x);
        let x = self.pool2.forward(x);

        let x = self.conv3.forward(x);
        let x = self.activation.forward(x);

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);
        let x = self.dropout.forward(x);

        let x = self.fc1.forward(x);
        self.activation.forward(x)
    }
}

impl<B: Backend> Classifier<B, 4> for SimpleCnn<B> {
    fn forward(&self, inputs: Tensor<B, 4>) -> Tensor<B, 2> {
        SimpleCnn::forward(self, inputs)
    }

    fn features(&self, inputs: Tensor<B, 4>) -> Tensor<B, 2> {
        SimpleCnn::features(self, inputs)
    }
}
