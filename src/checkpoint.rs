//! Model checkpoints.
//!
//! A checkpoint is a single tar.gz archive:
//! - metadata.json  - training state and the model spec it was built from
//! - model.bin      - model weights (burn binary record, full precision)
//! - optimizer.bin  - optimizer state, present for checkpoints saved while training

use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Record, Recorder},
    tensor::backend::Backend,
};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

use crate::config::ClassSpec;
use crate::error::{Error, Result};

const METADATA_ENTRY: &str = "metadata.json";
const MODEL_ENTRY: &str = "model.bin";
const OPTIMIZER_ENTRY: &str = "optimizer.bin";

/// File name of the most recent checkpoint, directly under `model_directory`
pub const LATEST_CHECKPOINT: &str = "checkpoint.tar.gz";

type BytesRecorder = BinBytesRecorder<FullPrecisionSettings>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Completed epochs
    pub epoch: usize,
    /// Mean training loss of the last completed epoch
    pub loss: f64,
    /// Start of the run (RFC 3339)
    pub start: String,
    pub run_id: String,
    /// Label names in class-index order
    pub labels: Vec<String>,
    /// Model `{classname, config}` the weights belong to
    pub model: ClassSpec,
    pub saved_at: String,
}

impl CheckpointMetadata {
    pub fn new(
        epoch: usize,
        loss: f64,
        start: String,
        run_id: String,
        labels: Vec<String>,
        model: ClassSpec,
    ) -> Self {
        Self {
            epoch,
            loss,
            start,
            run_id,
            labels,
            model,
            saved_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

impl fmt::Display for CheckpointMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model:    {}", self.model.classname)?;
        writeln!(f, "run id:   {}", self.run_id)?;
        writeln!(f, "epoch:    {}", self.epoch)?;
        writeln!(f, "loss:     {:.6}", self.loss)?;
        writeln!(f, "started:  {}", self.start)?;
        writeln!(f, "saved at: {}", self.saved_at)?;
        write!(f, "labels:   {}", self.labels.join(", "))
    }
}

/// Archive contents, weights still encoded
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub metadata: CheckpointMetadata,
    pub model: Vec<u8>,
    pub optimizer: Option<Vec<u8>>,
}

pub fn encode_record<B: Backend, R: Record<B>>(record: R) -> Result<Vec<u8>> {
    let recorder = BytesRecorder::default();
    Ok(Recorder::<B>::record(&recorder, record, ())?)
}

pub fn decode_record<B: Backend, R: Record<B>>(bytes: Vec<u8>, device: &B::Device) -> Result<R> {
    let recorder = BytesRecorder::default();
    Ok(Recorder::<B>::load(&recorder, bytes, device)?)
}

/// Encode a module's weights
pub fn encode_module<B: Backend, M: Module<B>>(module: &M) -> Result<Vec<u8>> {
    encode_record::<B, _>(module.clone().into_record())
}

/// Load encoded weights into `module`
pub fn decode_module<B: Backend, M: Module<B>>(
    module: M,
    bytes: Vec<u8>,
    device: &B::Device,
) -> Result<M> {
    let record = decode_record::<B, M::Record>(bytes, device)?;
    Ok(module.load_record(record))
}

fn append_entry<W: std::io::Write>(
    builder: &mut Builder<W>,
    name: &str,
    data: &[u8],
    archive: &Path,
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header
        .set_path(name)
        .map_err(|e| Error::io(archive, e))?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, data)
        .map_err(|e| Error::io(archive, e))
}

/// Write a checkpoint archive to `path`
pub fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

    let json = serde_json::to_vec_pretty(&checkpoint.metadata).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    append_entry(&mut builder, METADATA_ENTRY, &json, path)?;
    append_entry(&mut builder, MODEL_ENTRY, &checkpoint.model, path)?;
    if let Some(optimizer) = &checkpoint.optimizer {
        append_entry(&mut builder, OPTIMIZER_ENTRY, optimizer, path)?;
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Save a checkpoint under `model_directory/run_id/` and refresh
/// `model_directory/checkpoint.tar.gz`.
///
/// Returns the path of the per-run archive.
pub fn save_checkpoint(model_directory: &Path, checkpoint: &Checkpoint) -> Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%dT%H%M%S%.3f");
    let path = model_directory
        .join(&checkpoint.metadata.run_id)
        .join(format!("checkpoint_{timestamp}.tar.gz"));
    write_checkpoint(&path, checkpoint)?;

    let latest = model_directory.join(LATEST_CHECKPOINT);
    fs::copy(&path, &latest).map_err(|e| Error::io(&latest, e))?;

    tracing::info!(
        epoch = checkpoint.metadata.epoch,
        path = %path.display(),
        "checkpoint saved"
    );
    Ok(path)
}

fn open_archive(path: &Path) -> Result<Archive<GzDecoder<File>>> {
    if !path.is_file() {
        return Err(Error::CheckpointNotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

fn parse_metadata(path: &Path, json: &[u8]) -> Result<CheckpointMetadata> {
    serde_json::from_slice(json).map_err(|source| Error::Json {
        path: path.join(METADATA_ENTRY),
        source,
    })
}

/// Read a whole checkpoint archive
pub fn load_checkpoint(path: &Path) -> Result<Checkpoint> {
    let mut archive = open_archive(path)?;

    let mut metadata = None;
    let mut model = None;
    let mut optimizer = None;
    for entry in archive.entries().map_err(|e| Error::io(path, e))? {
        let mut entry = entry.map_err(|e| Error::io(path, e))?;
        let name = entry
            .path()
            .map_err(|e| Error::io(path, e))?
            .to_string_lossy()
            .into_owned();
        let mut buffer = Vec::new();
        entry
            .read_to_end(&mut buffer)
            .map_err(|e| Error::io(path, e))?;

        match name.as_str() {
            METADATA_ENTRY => metadata = Some(parse_metadata(path, &buffer)?),
            MODEL_ENTRY => model = Some(buffer),
            OPTIMIZER_ENTRY => optimizer = Some(buffer),
            _ => {}
        }
    }

    match (metadata, model) {
        (Some(metadata), Some(model)) => Ok(Checkpoint {
            metadata,
            model,
            optimizer,
        }),
        (None, _) => Err(Error::Other(format!(
            "{METADATA_ENTRY} not found in {}",
            path.display()
        ))),
        (_, None) => Err(Error::Other(format!(
            "{MODEL_ENTRY} not found in {}",
            path.display()
        ))),
    }
}

/// Read only the metadata of a checkpoint
pub fn load_metadata(path: &Path) -> Result<CheckpointMetadata> {
    let mut archive = open_archive(path)?;
    for entry in archive.entries().map_err(|e| Error::io(path, e))? {
        let mut entry = entry.map_err(|e| Error::io(path, e))?;
        let is_metadata = entry
            .path()
            .map_err(|e| Error::io(path, e))?
            .to_str()
            == Some(METADATA_ENTRY);
        if is_metadata {
            let mut buffer = Vec::new();
            entry
                .read_to_end(&mut buffer)
                .map_err(|e| Error::io(path, e))?;
            return parse_metadata(path, &buffer);
        }
    }
    Err(Error::Other(format!(
        "{METADATA_ENTRY} not found in {}",
        path.display()
    )))
}
