//! Image decoding and normalisation.

use image::imageops::FilterType;
use std::path::Path;

use crate::error::{Error, Result};

/// Number of channels every image is decoded to
pub const IMAGE_CHANNELS: usize = 3;

/// ImageNet channel statistics
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Load an image, resize it to `size`x`size` if needed and normalise it.
///
/// # Returns
/// - RGB values normalised with the ImageNet mean and std, flattened in
///   (C, H, W) order
pub fn load_and_normalize_image(path: &Path, size: usize) -> Result<Vec<f32>> {
    let img = image::open(path)
        .map_err(|source| Error::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();

    let side = size as u32;
    let img = if img.dimensions() != (side, side) {
        image::imageops::resize(&img, side, side, FilterType::Triangle)
    } else {
        img
    };

    let mut data = Vec::with_capacity(IMAGE_CHANNELS * size * size);
    for channel in 0..IMAGE_CHANNELS {
        for y in 0..side {
            for x in 0..side {
                let value = img.get_pixel(x, y)[channel] as f32 / 255.0;
                data.push((value - MEAN[channel]) / STD[channel]);
            }
        }
    }

    Ok(data)
}
