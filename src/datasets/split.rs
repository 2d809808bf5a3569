//! Train / validation / test splitting.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

use super::LabeledDataset;
use crate::config::{SplitConfig, SplitPart};
use crate::error::{Error, Result};

/// What a split run did
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    /// Files were written; one entry per part with its sample count
    Written(Vec<(SplitPart, PathBuf, usize)>),
    /// Every split file already existed and `override` was not set
    Skipped,
}

pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Shuffle `0..len` with `seed` and cut it by the split ratios.
///
/// Every part but the last gets `floor(len * ratio / 100)` samples, the last
/// one takes the remainder, so the parts are disjoint and cover every index.
pub fn split_indices(
    len: usize,
    split: &SplitConfig,
    seed: u64,
) -> Result<Vec<(SplitPart, Vec<usize>)>> {
    split.validate().map_err(Error::dataset)?;

    let mut indices: Vec<usize> = (0..len).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let parts = split.parts();
    let mut result = Vec::with_capacity(parts.len());
    let mut start = 0;
    for (i, (part, set)) in parts.iter().enumerate() {
        let end = if i + 1 == parts.len() {
            len
        } else {
            (start + len * set.ratio as usize / 100).min(len)
        };
        result.push((*part, indices[start..end].to_vec()));
        start = end;
    }
    Ok(result)
}

/// Split a dataset and write every part to its file
pub fn split_dataset(
    dataset: &dyn LabeledDataset,
    split: &SplitConfig,
    seed: u64,
    override_existing: bool,
) -> Result<SplitOutcome> {
    let parts = split.parts();
    if !override_existing && parts.iter().all(|(_, set)| set.file.exists()) {
        tracing::info!("split files already exist, skipping (set `override` to regenerate)");
        return Ok(SplitOutcome::Skipped);
    }

    let mut written = Vec::new();
    for ((part, indices), (_, set)) in split_indices(dataset.num_samples(), split, seed)?
        .into_iter()
        .zip(parts)
    {
        dataset.write_subset(&indices, &set.file)?;
        tracing::info!(
            part = part.as_str(),
            samples = indices.len(),
            file = %set.file.display(),
            "split written"
        );
        written.push((part, set.file.clone(), indices.len()));
    }
    Ok(SplitOutcome::Written(written))
}
