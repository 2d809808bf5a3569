//! Dataset loaders.
//!
//! Every loader yields one of two in-memory datasets: [`ImageDataset`]
//! (image paths plus label sets, decoded lazily by the batcher) or
//! [`SequenceDataset`] (time series held in memory). Both implement burn's
//! `Dataset` for their item type and [`LabeledDataset`] for the label-level
//! operations used by the split and stats tasks.

pub mod batcher;
pub mod image_folder;
pub mod image_io;
pub mod multiclass;
pub mod multilabel;
pub mod split;
pub mod timeseries;

use burn::data::dataset::Dataset;
use std::path::{Path, PathBuf};

use crate::config::{ClassSpec, DatasetCommon, LoaderConfig};
use crate::error::{Error, Result};
use crate::registry::{self, DatasetKind};

pub use batcher::{ClassificationBatch, ImageBatcher, SequenceBatcher};
pub use split::{split_dataset, split_indices, SplitOutcome};

/// Image sample (decoded on demand)
#[derive(Clone, Debug, PartialEq)]
pub struct ImageItem {
    pub path: PathBuf,
    /// Indices into the dataset's label list
    pub labels: Vec<usize>,
}

/// Time-series sample, `sequence_length * input_dim` values in time-major order
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceItem {
    pub values: Vec<f32>,
    pub labels: Vec<usize>,
}

/// How a dataset writes a subset of itself back to disk
#[derive(Clone, Debug, PartialEq)]
pub enum SubsetFormat {
    /// `image_path,label` rows
    MultiClassCsv,
    /// `image,<label>...` header with 0/1 cells
    MultiLabelCsv { delimiter: u8 },
}

/// Label-level view shared by every dataset
pub trait LabeledDataset {
    fn labels(&self) -> &[String];
    fn num_samples(&self) -> usize;
    fn label_set(&self, index: usize) -> Option<&[usize]>;
    fn is_multilabel(&self) -> bool;
    /// Write the samples at `indices` to `path` in the dataset's own file format
    fn write_subset(&self, indices: &[usize], path: &Path) -> Result<()>;
}

/// Image classification dataset
#[derive(Clone, Debug)]
pub struct ImageDataset {
    samples: Vec<ImageItem>,
    labels: Vec<String>,
    image_size: usize,
    multilabel: bool,
    format: SubsetFormat,
    common: DatasetCommon,
}

impl ImageDataset {
    pub fn new(
        samples: Vec<ImageItem>,
        labels: Vec<String>,
        image_size: usize,
        multilabel: bool,
        format: SubsetFormat,
        common: DatasetCommon,
    ) -> Self {
        Self {
            samples,
            labels,
            image_size,
            multilabel,
            format,
            common,
        }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn loader_config(&self) -> &LoaderConfig {
        &self.common.loader
    }

    pub fn common(&self) -> &DatasetCommon {
        &self.common
    }

    pub fn samples(&self) -> &[ImageItem] {
        &self.samples
    }
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

impl LabeledDataset for ImageDataset {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn label_set(&self, index: usize) -> Option<&[usize]> {
        self.samples.get(index).map(|s| s.labels.as_slice())
    }

    fn is_multilabel(&self) -> bool {
        self.multilabel
    }

    fn write_subset(&self, indices: &[usize], path: &Path) -> Result<()> {
        let rows = pick(&self.samples, indices)?;
        match self.format {
            SubsetFormat::MultiClassCsv => multiclass::write_rows(path, &rows, &self.labels),
            SubsetFormat::MultiLabelCsv { delimiter } => {
                multilabel::write_rows(path, &rows, &self.labels, delimiter)
            }
        }
    }
}

/// Time-series classification dataset
#[derive(Clone, Debug)]
pub struct SequenceDataset {
    samples: Vec<SequenceItem>,
    labels: Vec<String>,
    sequence_length: usize,
    input_dim: usize,
    common: DatasetCommon,
}

impl SequenceDataset {
    pub fn new(
        samples: Vec<SequenceItem>,
        labels: Vec<String>,
        sequence_length: usize,
        input_dim: usize,
        common: DatasetCommon,
    ) -> Self {
        Self {
            samples,
            labels,
            sequence_length,
            input_dim,
            common,
        }
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn loader_config(&self) -> &LoaderConfig {
        &self.common.loader
    }

    pub fn common(&self) -> &DatasetCommon {
        &self.common
    }
}

impl Dataset<SequenceItem> for SequenceDataset {
    fn get(&self, index: usize) -> Option<SequenceItem> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

impl LabeledDataset for SequenceDataset {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn label_set(&self, index: usize) -> Option<&[usize]> {
        self.samples.get(index).map(|s| s.labels.as_slice())
    }

    fn is_multilabel(&self) -> bool {
        false
    }

    fn write_subset(&self, indices: &[usize], path: &Path) -> Result<()> {
        let rows = pick(&self.samples, indices)?;
        timeseries::write_rows(path, &rows, &self.labels)
    }
}

fn pick<'a, T>(samples: &'a [T], indices: &[usize]) -> Result<Vec<&'a T>> {
    indices
        .iter()
        .map(|&i| {
            samples
                .get(i)
                .ok_or_else(|| Error::dataset(format!("sample index {i} out of range")))
        })
        .collect()
}

/// A dataset built from a `{classname, config}` spec
#[derive(Clone, Debug)]
pub enum LoadedDataset {
    Image(ImageDataset),
    Sequence(SequenceDataset),
}

impl LoadedDataset {
    pub fn as_labeled(&self) -> &dyn LabeledDataset {
        match self {
            LoadedDataset::Image(ds) => ds as &dyn LabeledDataset,
            LoadedDataset::Sequence(ds) => ds as &dyn LabeledDataset,
        }
    }

    pub fn common(&self) -> &DatasetCommon {
        match self {
            LoadedDataset::Image(ds) => ds.common(),
            LoadedDataset::Sequence(ds) => ds.common(),
        }
    }

    pub fn as_image(&self) -> Option<&ImageDataset> {
        match self {
            LoadedDataset::Image(ds) => Some(ds),
            LoadedDataset::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceDataset> {
        match self {
            LoadedDataset::Image(_) => None,
            LoadedDataset::Sequence(ds) => Some(ds),
        }
    }

    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            LoadedDataset::Image(ds) if ds.is_multilabel() => "multi-label image dataset".into(),
            LoadedDataset::Image(_) => "image dataset".into(),
            LoadedDataset::Sequence(ds) => format!(
                "time-series dataset ({} steps x {} bands)",
                ds.sequence_length(),
                ds.input_dim()
            ),
        }
    }
}

/// Resolve the class name and load the dataset it names
pub fn load_dataset(spec: &ClassSpec) -> Result<(DatasetKind, LoadedDataset)> {
    let kind = registry::resolve_dataset(&spec.classname)?;
    let dataset = match kind {
        DatasetKind::MultiClass => {
            LoadedDataset::Image(multiclass::load(&registry::instantiate(spec)?)?)
        }
        DatasetKind::ImageFolder => {
            LoadedDataset::Image(image_folder::load(&registry::instantiate(spec)?)?)
        }
        DatasetKind::MultiLabel => {
            LoadedDataset::Image(multilabel::load(&registry::instantiate(spec)?)?)
        }
        DatasetKind::UcMercedMultiLabel => {
            let mut cfg: crate::config::MultiLabelDatasetConfig = registry::instantiate(spec)?;
            if cfg.labels.is_none() {
                cfg.labels = Some(multilabel::UC_MERCED_LABELS.iter().map(|s| s.to_string()).collect());
            }
            LoadedDataset::Image(multilabel::load(&cfg)?)
        }
        DatasetKind::TimeSeries => {
            LoadedDataset::Sequence(timeseries::load(&registry::instantiate(spec)?)?)
        }
    };
    tracing::info!(
        classname = %spec.classname,
        samples = dataset.as_labeled().num_samples(),
        labels = dataset.as_labeled().labels().len(),
        "dataset loaded"
    );
    Ok((kind, dataset))
}

/// Number of samples carrying each label, in label order
pub fn label_counts(dataset: &dyn LabeledDataset) -> Vec<(String, usize)> {
    let mut counts = vec![0usize; dataset.labels().len()];
    for index in 0..dataset.num_samples() {
        if let Some(set) = dataset.label_set(index) {
            for &label in set {
                if let Some(count) = counts.get_mut(label) {
                    *count += 1;
                }
            }
        }
    }
    dataset
        .labels()
        .iter()
        .cloned()
        .zip(counts)
        .collect()
}

/// Resolve a path read from a data file against `base` when it is relative
pub(crate) fn resolve_path(raw: &str, base: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(raw);
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

/// Sample path as written to a subset file.
///
/// Subset files can live in another directory than the file they were read
/// from, so relative paths are made absolute against the working directory.
pub(crate) fn subset_path(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path).map_err(|e| Error::io(path, e))?;
    Ok(absolute.to_string_lossy().into_owned())
}

/// Directory relative sample paths are resolved against
pub(crate) fn base_dir(root_dir: Option<&PathBuf>, csv_file_path: &Path) -> Option<PathBuf> {
    root_dir
        .cloned()
        .or_else(|| csv_file_path.parent().map(Path::to_path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> ImageDataset {
        let item = |name: &str, labels: Vec<usize>| ImageItem {
            path: PathBuf::from(name),
            labels,
        };
        ImageDataset::new(
            vec![item("a.png", vec![0]), item("b.png", vec![1]), item("c.png", vec![0, 1])],
            vec!["forest".into(), "river".into()],
            8,
            true,
            SubsetFormat::MultiLabelCsv { delimiter: b',' },
            DatasetCommon::default(),
        )
    }

    #[test]
    fn test_label_counts() {
        let counts = label_counts(&dataset());
        assert_eq!(counts, vec![("forest".into(), 2), ("river".into(), 2)]);
    }

    #[test]
    fn test_dataset_get_and_len() {
        let ds = dataset();
        assert_eq!(Dataset::len(&ds), 3);
        assert_eq!(ds.get(2).unwrap().labels, vec![0, 1]);
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_write_subset_rejects_bad_index() {
        let dir = tempfile::tempdir().unwrap();
        let err = dataset().write_subset(&[0, 7], &dir.path().join("x.csv")).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/data");
        assert_eq!(resolve_path("img/a.png", Some(base)), PathBuf::from("/data/img/a.png"));
        assert_eq!(resolve_path("/abs/a.png", Some(base)), PathBuf::from("/abs/a.png"));
        assert_eq!(resolve_path("a.png", None), PathBuf::from("a.png"));
    }
}
