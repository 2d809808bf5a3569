use serde::Serialize;
use std::path::Path;

use crate::config::{ExperimentConfig, SplitTaskConfig, StatsTaskConfig};
use crate::datasets::{label_counts, load_dataset, split::ensure_parent, split_dataset};
use crate::error::{Error, Result};

use super::{dataset_spec, TaskOutcome};

pub(super) fn run_split(config: &ExperimentConfig, task: &SplitTaskConfig) -> Result<TaskOutcome> {
    let spec = dataset_spec(config, task.dataset_config.as_ref())?;
    let (_, dataset) = load_dataset(spec)?;
    let common = dataset.common();
    let split = common.split.as_ref().ok_or_else(|| Error::InvalidConfig {
        classname: spec.classname.clone(),
        msg: "no `split` configured for this dataset".into(),
    })?;
    let outcome = split_dataset(
        dataset.as_labeled(),
        split,
        common.loader.seed,
        common.override_existing,
    )?;
    Ok(TaskOutcome::Split(outcome))
}

#[derive(Debug, Serialize)]
struct CountRow<'a> {
    label: &'a str,
    count: usize,
}

fn write_counts(path: &Path, counts: &[(String, usize)]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| Error::csv(path, e))?;
    for (label, count) in counts {
        writer
            .serialize(CountRow {
                label,
                count: *count,
            })
            .map_err(|e| Error::csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}

pub(super) fn run_stats(config: &ExperimentConfig, task: &StatsTaskConfig) -> Result<TaskOutcome> {
    let (_, dataset) = load_dataset(dataset_spec(config, task.dataset_config.as_ref())?)?;
    let counts = label_counts(dataset.as_labeled());
    for (label, count) in &counts {
        tracing::info!(label = %label, count, "label count");
    }
    if let Some(path) = &task.output_file {
        write_counts(path, &counts)?;
        tracing::info!(file = %path.display(), "label counts written");
    }
    Ok(TaskOutcome::Stats(counts))
}
