//! Satellite image time series read from a CSV file.
//!
//! Each row is `label,v1,...,vN` with `N = sequence_length * input_dim`,
//! values ordered by time step first (`t0d0, t0d1, ..., t1d0, ...`).

use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

use super::{SequenceDataset, SequenceItem};
use crate::config::TimeSeriesDatasetConfig;
use crate::error::{Error, Result};

pub fn load(config: &TimeSeriesDatasetConfig) -> Result<SequenceDataset> {
    if config.labels.is_empty() {
        return Err(Error::dataset(
            "You need to provide the list of labels for the dataset",
        ));
    }
    if config.sequence_length == 0 || config.input_dim == 0 {
        return Err(Error::dataset(
            "sequence_length and input_dim must be positive",
        ));
    }

    let path = &config.csv_file_path;
    let expected = config.sequence_length * config.input_dim;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::csv(path, e))?;
        let label = record.get(0).unwrap_or_default().trim();
        let class_id = config.labels.iter().position(|l| l == label).ok_or_else(|| {
            Error::dataset(format!(
                "{}:{}: label `{}` is not in the label list",
                path.display(),
                row + 1,
                label
            ))
        })?;

        let values = record
            .iter()
            .skip(1)
            .map(|v| v.trim().parse::<f32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::dataset(format!("{}:{}: {}", path.display(), row + 1, e)))?;
        if values.len() != expected {
            return Err(Error::dataset(format!(
                "{}:{}: expected {} values ({} steps x {} bands), got {}",
                path.display(),
                row + 1,
                expected,
                config.sequence_length,
                config.input_dim,
                values.len()
            )));
        }

        samples.push(SequenceItem {
            values,
            labels: vec![class_id],
        });
    }

    Ok(SequenceDataset::new(
        samples,
        config.labels.clone(),
        config.sequence_length,
        config.input_dim,
        config.common.clone(),
    ))
}

pub(crate) fn write_rows(path: &Path, rows: &[&SequenceItem], labels: &[String]) -> Result<()> {
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
            .ok_or_else(|| Error::dataset("time series sample without label"))?;
        let mut record = Vec::with_capacity(item.values.len() + 1);
        record.push(label.clone());
        record.extend(item.values.iter().map(|v| v.to_string()));
        writer.write_record(&record).map_err(|e| Error::csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetCommon;
    use crate::datasets::LabeledDataset;
    use std::fs;

    fn config(csv: &Path) -> TimeSeriesDatasetConfig {
        TimeSeriesDatasetConfig {
            common: DatasetCommon::default(),
            csv_file_path: csv.to_path_buf(),
            labels: vec!["wheat".into(), "maize".into()],
            sequence_length: 2,
            input_dim: 2,
        }
    }

    #[test]
    fn test_load_rows() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("series.csv");
        fs::write(&csv, "maize,0.1,0.2,0.3,0.4\nwheat,1,2,3,4\n").unwrap();

        let ds = load(&config(&csv)).unwrap();
        assert_eq!(ds.num_samples(), 2);
        assert_eq!(ds.label_set(0).unwrap(), &[1]);
        assert_eq!(burn::data::dataset::Dataset::get(&ds, 1).unwrap().values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("series.csv");
        fs::write(&csv, "maize,0.1,0.2,0.3\n").unwrap();
        let err = load(&config(&csv)).unwrap_err();
        assert!(err.to_string().contains("expected 4 values"));
    }

    #[test]
    fn test_non_numeric_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("series.csv");
        fs::write(&csv, "maize,0.1,abc,0.3,0.4\n").unwrap();
        assert!(load(&config(&csv)).is_err());
    }

    #[test]
    fn test_subset_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("series.csv");
        fs::write(&csv, "maize,0.5,0.25,0.125,1\nwheat,1,2,3,4\n").unwrap();
        let ds = load(&config(&csv)).unwrap();

        let out = dir.path().join("one.csv");
        ds.write_subset(&[0], &out).unwrap();
        let subset = load(&config(&out)).unwrap();
        assert_eq!(
            burn::data::dataset::Dataset::get(&subset, 0).unwrap(),
            burn::data::dataset::Dataset::get(&ds, 0).unwrap()
        );
    }
}
