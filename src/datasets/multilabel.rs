//! Multi-label dataset read from a CSV file with a header row.
//!
//! ```text
//! image,airplane,bare-soil,buildings
//! img/a.png,1,0,1
//! ```
//!
//! The first column names the image, every other column is a 0/1 flag for
//! the label in its header cell.

use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

use super::{base_dir, resolve_path, subset_path, ImageDataset, ImageItem, SubsetFormat};
use crate::config::MultiLabelDatasetConfig;
use crate::error::{Error, Result};

/// UC Merced land-use multi-label annotations
pub const UC_MERCED_LABELS: [&str; 17] = [
    "airplane",
    "bare-soil",
    "buildings",
    "cars",
    "chaparral",
    "court",
    "dock",
    "field",
    "grass",
    "mobile-home",
    "pavement",
    "sand",
    "sea",
    "ship",
    "tanks",
    "trees",
    "water",
];

pub fn load(config: &MultiLabelDatasetConfig) -> Result<ImageDataset> {
    let delimiter = delimiter_byte(config.delimiter)?;
    let path = &config.csv_file_path;
    let base = base_dir(config.root_dir.as_ref(), path);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| Error::csv(path, e))?
        .iter()
        .skip(1)
        .map(|h| h.trim().to_string())
        .collect();
    if header.is_empty() {
        return Err(Error::dataset(format!(
            "{}: header has no label columns",
            path.display()
        )));
    }

    // column index in the file -> label index in the dataset
    let labels = config.labels.clone().unwrap_or_else(|| header.clone());
    let mut column_to_label = Vec::with_capacity(header.len());
    for name in &header {
        let index = labels.iter().position(|l| l == name).ok_or_else(|| {
            Error::dataset(format!(
                "{}: column `{}` is not in the label list",
                path.display(),
                name
            ))
        })?;
        column_to_label.push(index);
    }
    if let Some(missing) = labels.iter().find(|l| !header.contains(l)) {
        return Err(Error::dataset(format!(
            "{}: label `{}` has no column",
            path.display(),
            missing
        )));
    }

    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::csv(path, e))?;
        let image = record.get(0).unwrap_or_default().trim();
        if image.is_empty() {
            return Err(Error::dataset(format!(
                "{}:{}: missing image path",
                path.display(),
                row + 2
            )));
        }
        let mut set = Vec::new();
        for (column, cell) in record.iter().skip(1).enumerate() {
            match cell.trim() {
                "1" => set.push(column_to_label[column]),
                "0" | "" => {}
                other => {
                    return Err(Error::dataset(format!(
                        "{}:{}: expected 0 or 1, got `{}`",
                        path.display(),
                        row + 2,
                        other
                    )))
                }
            }
        }
        set.sort_unstable();
        samples.push(ImageItem {
            path: resolve_path(image, base.as_deref()),
            labels: set,
        });
    }

    Ok(ImageDataset::new(
        samples,
        labels,
        config.image_size,
        true,
        SubsetFormat::MultiLabelCsv { delimiter },
        config.common.clone(),
    ))
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(Error::dataset(format!("delimiter `{delimiter}` must be ASCII")))
    }
}

/// Write a header plus one 0/1 row per sample
pub(crate) fn write_rows(
    path: &Path,
    rows: &[&ImageItem],
    labels: &[String],
    delimiter: u8,
) -> Result<()> {
    super::split::ensure_parent(path)?;
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| Error::csv(path, e))?;

    let mut header = vec!["image".to_string()];
    header.extend(labels.iter().cloned());
    writer.write_record(&header).map_err(|e| Error::csv(path, e))?;

    for item in rows {
        let mut record = vec![subset_path(&item.path)?];
        record.extend((0..labels.len()).map(|i| {
            let flag = if item.labels.contains(&i) { "1" } else { "0" };
            flag.to_string()
        }));
        writer.write_record(&record).map_err(|e| Error::csv(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))
}
