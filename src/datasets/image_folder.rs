//! Dataset read from a directory with one sub-directory per label.

use std::fs;
use std::path::Path;

use super::{ImageDataset, ImageItem, SubsetFormat};
use crate::config::ImageFolderDatasetConfig;
use crate::error::{Error, Result};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tif", "tiff"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Sorted names of the label sub-directories
fn discover_labels(data_dir: &Path) -> Result<Vec<String>> {
    let mut labels = Vec::new();
    for entry in fs::read_dir(data_dir).map_err(|e| Error::io(data_dir, e))? {
        let path = entry.map_err(|e| Error::io(data_dir, e))?.path();
        if path.is_dir() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                labels.push(name.to_string());
            }
        }
    }
    labels.sort();
    Ok(labels)
}

pub fn load(config: &ImageFolderDatasetConfig) -> Result<ImageDataset> {
    let data_dir = &config.data_dir;
    let labels = match &config.labels {
        Some(labels) => labels.clone(),
        None => discover_labels(data_dir)?,
    };
    if labels.is_empty() {
        return Err(Error::dataset(format!(
            "no label directories found in {}",
            data_dir.display()
        )));
    }

    let mut samples = Vec::new();
    for (class_id, class_name) in labels.iter().enumerate() {
        let class_dir = data_dir.join(class_name);
        if !class_dir.is_dir() {
            tracing::warn!(label = %class_name, "label directory missing, skipping");
            continue;
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&class_dir).map_err(|e| Error::io(&class_dir, e))? {
            let path = entry.map_err(|e| Error::io(&class_dir, e))?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        // read_dir order is platform dependent
        paths.sort();
        tracing::debug!(label = %class_name, count = paths.len(), "label directory scanned");
        samples.extend(paths.into_iter().map(|path| ImageItem {
            path,
            labels: vec![class_id],
        }));
    }

    if samples.is_empty() {
        return Err(Error::dataset(format!(
            "no images found in {}",
            data_dir.display()
        )));
    }

    Ok(ImageDataset::new(
        samples,
        labels,
        config.image_size,
        false,
        SubsetFormat::MultiClassCsv,
        config.common.clone(),
    ))
}
