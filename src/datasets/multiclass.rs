//! Multi-class dataset read from a CSV file.
//!
//! The file has no header, one sample per row:
//!
//! ```text
//! image_path1,label1
//! image_path2,label2
//! ```

use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

use super::{base_dir, resolve_path, subset_path, ImageDataset, ImageItem, SubsetFormat};
use crate::config::MultiClassDatasetConfig;
use crate::error::{Error, Result};

pub fn load(config: &MultiClassDatasetConfig) -> Result<ImageDataset> {
    if config.labels.is_empty() {
        return Err(Error::dataset(
            "You need to provide the list of labels for the dataset",
        ));
    }

    let path = &config.csv_file_path;
    let base = base_dir(config.root_dir.as_ref(), path);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::csv(path, e))?;
        let image = record
            .get(0)
            .ok_or_else(|| Error::dataset(format!("{}:{}: missing image path", path.display(), row + 1)))?;
        let label = record
            .get(1)
            .ok_or_else(|| Error::dataset(format!("{}:{}: missing label", path.display(), row + 1)))?
            .trim();
        let class_id = config.labels.iter().position(|l| l == label).ok_or_else(|| {
            Error::dataset(format!(
                "{}:{}: label `{}` is not in the label list",
                path.display(),
                row + 1,
                label
            ))
        })?;
        samples.push(ImageItem {
            path: resolve_path(image.trim(), base.as_deref()),
            labels: vec![class_id],
        });
    }

    Ok(ImageDataset::new(
        samples,
        config.labels.clone(),
        config.image_size,
        false,
        SubsetFormat::MultiClassCsv,
        config.common.clone(),
    ))
}

/// Write `image_path,label` rows
pub(crate) fn write_rows(path: &Path, rows: &[&ImageItem], labels: &[String]) -> Result<()> {
    super::split::ensure_parent(path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;
    for item in rows {
        let label = item
            .labels
            .first()
            .and_then(|&i| labels.get(i))
            .ok_or_else(|| Error::dataset(format!("{} has no label", item.path.display())))?;
        writer
            .write_record([subset_path(&item.path)?.as_str(), label.as_str()])
            .map_err(|e| Error::csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetCommon;
    use crate::datasets::LabeledDataset;
    use std::fs;

    fn config(csv: &Path, labels: &[&str]) -> MultiClassDatasetConfig {
        MultiClassDatasetConfig {
            common: DatasetCommon::default(),
            csv_file_path: csv.to_path_buf(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            root_dir: None,
            image_size: 8,
        }
    }

    #[test]
    fn test_load_resolves_labels_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("train.csv");
        fs::write(&csv, "img/a.png,forest\nimg/b.png,river\n/abs/c.png,forest\n").unwrap();

        let ds = load(&config(&csv, &["forest", "river"])).unwrap();
        assert_eq!(ds.num_samples(), 3);
        assert_eq!(ds.samples()[0].path, dir.path().join("img/a.png"));
        assert_eq!(ds.samples()[1].labels, vec![1]);
        assert_eq!(ds.samples()[2].path, Path::new("/abs/c.png"));
        assert!(!ds.is_multilabel());
    }

    #[test]
    fn test_labels_required() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("train.csv");
        fs::write(&csv, "a.png,forest\n").unwrap();
        assert!(load(&config(&csv, &[])).is_err());
    }

    #[test]
    fn test_unknown_label_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("train.csv");
        fs::write(&csv, "a.png,desert\n").unwrap();
        let err = load(&config(&csv, &["forest"])).unwrap_err();
        assert!(err.to_string().contains("desert"));
    }

    #[test]
    fn test_subset_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("all.csv");
        fs::write(&csv, "a.png,forest\nb.png,river\nc.png,river\n").unwrap();
        let ds = load(&config(&csv, &["forest", "river"])).unwrap();

        let out = dir.path().join("splits/test.csv");
        ds.write_subset(&[2, 0], &out).unwrap();

        let subset = load(&config(&out, &["forest", "river"])).unwrap();
        assert_eq!(subset.num_samples(), 2);
        assert_eq!(subset.samples()[0].path, dir.path().join("c.png"));
        assert_eq!(subset.samples()[0].labels, vec![1]);
        assert_eq!(subset.samples()[1].labels, vec![0]);
    }

    #[test]
    fn test_subset_of_relative_csv_points_at_same_images() {
        // relative to the working directory, like a document's paths
        let dir = tempfile::tempdir_in(".").unwrap();
        assert!(dir.path().is_relative());
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("a.png"), b"").unwrap();
        fs::write(data.join("all.csv"), "a.png,forest
").unwrap();

        let ds = load(&config(&data.join("all.csv"), &["forest"])).unwrap();
        assert_eq!(ds.samples()[0].path, data.join("a.png"));

        let out = dir.path().join("splits/train.csv");
        ds.write_subset(&[0], &out).unwrap();
        let subset = load(&config(&out, &["forest"])).unwrap();
        let reloaded = &subset.samples()[0].path;
        assert!(reloaded.is_file());
        assert_eq!(
            std::path::absolute(reloaded).unwrap(),
            std::path::absolute(data.join("a.png")).unwrap()
        );
    }
}
