//! Temporal CNN for satellite image time series classification.
//!
//! Three 1-D convolution blocks over the time axis, a dense block and a
//! linear head, after the TempCNN architecture of Pelletier et al. (2019).

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig, PaddingConfig1d,
        Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use super::Classifier;
use crate::error::Error;

#[derive(Config, Debug)]
pub struct TempCnnConfig {
    /// Bands per time step
    pub input_dim: usize,
    /// Time steps per sample
    pub sequence_length: usize,
    pub num_classes: usize,
    #[config(default = 5)]
    pub kernel_size: usize,
    #[config(default = 64)]
    pub hidden_dims: usize,
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl TempCnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<TempCnn<B>> {
        if self.input_dim == 0 || self.sequence_length == 0 || self.hidden_dims == 0 {
            return Err(Error::Other(
                "input_dim, sequence_length and hidden_dims must be positive".into(),
            ));
        }
        // odd kernels keep the sequence length with kernel_size / 2 padding
        if self.kernel_size % 2 == 0 {
            return Err(Error::Other(format!(
                "kernel_size must be odd, got {}",
                self.kernel_size
            )));
        }
        if self.num_classes == 0 {
            return Err(Error::Other("num_classes must be positive".into()));
        }

        let block = |input: usize| ConvBlock {
            conv: Conv1dConfig::new(input, self.hidden_dims, self.kernel_size)
                .with_padding(PaddingConfig1d::Explicit(self.kernel_size / 2))
                .init(device),
            norm: LayerNormConfig::new(self.hidden_dims).init(device),
            activation: Relu::new(),
            dropout: DropoutConfig::new(self.dropout).init(),
        };
        let dense_width = 4 * self.hidden_dims;

        Ok(TempCnn {
            block1: block(self.input_dim),
            block2: block(self.hidden_dims),
            block3: block(self.hidden_dims),
            dense: LinearConfig::new(self.hidden_dims * self.sequence_length, dense_width)
                .init(device),
            dense_norm: LayerNormConfig::new(dense_width).init(device),
            dense_dropout: DropoutConfig::new(self.dropout).init(),
            head: LinearConfig::new(dense_width, self.num_classes).init(device),
            activation: Relu::new(),
        })
    }
}

/// Conv1d + normalisation over channels + ReLU + Dropout
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv1d<B>,
    norm: LayerNorm<B>,
    activation: Relu,
    dropout: Dropout,
}

impl<B: Backend> ConvBlock<B> {
    /// `[batch, channels, time] -> [batch, hidden, time]`
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.conv.forward(x);
        // normalise each time step over its channels
        let x = self.norm.forward(x.swap_dims(1, 2)).swap_dims(1, 2);
        let x = self.activation.forward(x);
        self.dropout.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct TempCnn<B: Backend> {
    block1: ConvBlock<B>,
    block2: ConvBlock<B>,
    block3: ConvBlock<B>,
    dense: Linear<B>,
    dense_norm: LayerNorm<B>,
    dense_dropout: Dropout,
    head: Linear<B>,
    activation: Relu,
}

impl<B: Backend> TempCnn<B> {
    /// # Arguments
    /// - `series`: `[batch, sequence_length, input_dim]`
    ///
    /// # Returns
    /// - logits `[batch, num_classes]`
    pub fn forward(&self, series: Tensor<B, 3>) -> Tensor<B, 2> {
        self.head.forward(self.features(series))
    }

    /// Dense block output before the classifier head, `[batch, 4 * hidden_dims]`
    pub fn features(&self, series: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch_size, _, _] = series.dims();

        let x = series.swap_dims(1, 2);
        let x = self.block1.forward(x);
        let x = self.block2.forward(x);
        let x = self.block3.forward(x);

        let [_, c, t] = x.dims();
        let x = x.reshape([batch_size, c * t]);
        let x = self.dense.forward(x);
        let x = self.dense_norm.forward(x);
        let x = self.activation.forward(x);
        self.dense_dropout.forward(x)
    }
}

impl<B: Backend> Classifier<B, 3> for TempCnn<B> {
    fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        TempCnn::forward(self, inputs)
    }

    fn features(&self, inputs: Tensor<B, 3>) -> Tensor<B, 2> {
        TempCnn::features(self, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = TempCnnConfig::new(13, 24, 4)
            .with_hidden_dims(8)
            .init::<TestBackend>(&device)
            .unwrap();
        let series = Tensor::<TestBackend, 3>::ones([3, 24, 13], &device);
        assert_eq!(model.forward(series.clone()).dims(), [3, 4]);
        assert_eq!(model.features(series).dims(), [3, 32]);
    }

    #[test]
    fn test_even_kernel_rejected() {
        let device = Default::default();
        let res = TempCnnConfig::new(2, 8, 2)
            .with_kernel_size(4)
            .init::<TestBackend>(&device);
        assert!(res.is_err());
    }
}
