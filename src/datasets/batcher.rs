//! Batchers turning dataset items into tensors.

use burn::data::dataloader::batcher::Batcher;
use burn::tensor::{backend::Backend, Int, Tensor, TensorData};

use super::image_io::{load_and_normalize_image, IMAGE_CHANNELS};
use super::{ImageItem, SequenceItem};

/// One batch of classification data
#[derive(Clone, Debug)]
pub struct ClassificationBatch<B: Backend, const D: usize> {
    pub inputs: Tensor<B, D>,
    /// Class index per sample (first label; 0 when a sample has none)
    pub targets: Tensor<B, 1, Int>,
    /// `[batch, num_classes]` 0/1 label matrix
    pub multi_hot: Tensor<B, 2, Int>,
    /// Host copy of the label sets for metric bookkeeping
    pub label_sets: Vec<Vec<usize>>,
}

fn label_tensors<B: Backend>(
    label_sets: &[Vec<usize>],
    num_classes: usize,
    device: &B::Device,
) -> (Tensor<B, 1, Int>, Tensor<B, 2, Int>) {
    let targets: Vec<i64> = label_sets
        .iter()
        .map(|set| set.first().copied().unwrap_or(0) as i64)
        .collect();

    let mut multi_hot = vec![0i64; label_sets.len() * num_classes];
    for (row, set) in label_sets.iter().enumerate() {
        for &label in set {
            if label < num_classes {
                multi_hot[row * num_classes + label] = 1;
            }
        }
    }

    let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), device);
    let multi_hot = Tensor::<B, 2, Int>::from_data(
        TensorData::new(multi_hot, [label_sets.len(), num_classes]),
        device,
    );
    (targets, multi_hot)
}

/// Decodes images and stacks them into `[batch, 3, size, size]`
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device: B::Device,
    image_size: usize,
    num_classes: usize,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, image_size: usize, num_classes: usize) -> Self {
        Self {
            device,
            image_size,
            num_classes,
        }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ClassificationBatch<B, 4>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>, _device: &B::Device) -> ClassificationBatch<B, 4> {
        let batch_size = items.len();
        let size = self.image_size;
        let pixels_per_image = IMAGE_CHANNELS * size * size;
        let mut pixels = Vec::with_capacity(batch_size * pixels_per_image);
        let mut label_sets = Vec::with_capacity(batch_size);

        for item in items {
            match load_and_normalize_image(&item.path, size) {
                Ok(data) => pixels.extend_from_slice(&data),
                Err(e) => {
                    // keep the batch shape; the sample contributes zeros
                    tracing::warn!(path = %item.path.display(), error = %e, "image load failed");
                    pixels.extend(std::iter::repeat(0.0f32).take(pixels_per_image));
                }
            }
            label_sets.push(item.labels);
        }

        let inputs = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, IMAGE_CHANNELS, size, size]);
        let (targets, multi_hot) = label_tensors::<B>(&label_sets, self.num_classes, &self.device);

        ClassificationBatch {
            inputs,
            targets,
            multi_hot,
            label_sets,
        }
    }
}

/// Stacks time series into `[batch, sequence_length, input_dim]`
#[derive(Clone, Debug)]
pub struct SequenceBatcher<B: Backend> {
    device: B::Device,
    sequence_length: usize,
    input_dim: usize,
    num_classes: usize,
}

impl<B: Backend> SequenceBatcher<B> {
    pub fn new(
        device: B::Device,
        sequence_length: usize,
        input_dim: usize,
        num_classes: usize,
    ) -> Self {
        Self {
            device,
            sequence_length,
            input_dim,
            num_classes,
        }
    }
}

impl<B: Backend> Batcher<B, SequenceItem, ClassificationBatch<B, 3>> for SequenceBatcher<B> {
    fn batch(&self, items: Vec<SequenceItem>, _device: &B::Device) -> ClassificationBatch<B, 3> {
        let batch_size = items.len();
        let mut values = Vec::with_capacity(batch_size * self.sequence_length * self.input_dim);
        let mut label_sets = Vec::with_capacity(batch_size);
        for item in items {
            values.extend_from_slice(&item.values);
            label_sets.push(item.labels);
        }

        let inputs = Tensor::<B, 1>::from_floats(values.as_slice(), &self.device)
            .reshape([batch_size, self.sequence_length, self.input_dim]);
        let (targets, multi_hot) = label_tensors::<B>(&label_sets, self.num_classes, &self.device);

        ClassificationBatch {
            inputs,
            targets,
            multi_hot,
            label_sets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    #[test]
    fn test_image_batch_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbImage::from_pixel(6, 6, Rgb([1, 2, 3])).save(&path).unwrap();

        let device = Default::default();
        let batcher = ImageBatcher::<TestBackend>::new(device, 4, 3);
        let items = vec![
            ImageItem { path: path.clone(), labels: vec![2] },
            ImageItem { path: PathBuf::from("/missing.png"), labels: vec![0, 1] },
        ];
        let batch = batcher.batch(items, &Default::default());

        assert_eq!(batch.inputs.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.targets.dims(), [2]);
        assert_eq!(batch.multi_hot.dims(), [2, 3]);
        assert_eq!(batch.label_sets, vec![vec![2], vec![0, 1]]);

        let hot: Vec<i64> = batch.multi_hot.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(hot, vec![0, 0, 1, 1, 1, 0]);
    }

    #[test]
    fn test_sequence_batch_layout() {
        let device = Default::default();
        let batcher = SequenceBatcher::<TestBackend>::new(device, 2, 3, 2);
        let items = vec![SequenceItem {
            values: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            labels: vec![1],
        }];
        let batch = batcher.batch(items, &Default::default());

        assert_eq!(batch.inputs.dims(), [1, 2, 3]);
        let second_step: Vec<f32> = batch
            .inputs
            .slice([0..1, 1..2, 0..3])
            .into_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        assert_eq!(second_step, vec![4.0, 5.0, 6.0]);
    }
}
