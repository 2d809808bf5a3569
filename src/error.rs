//! Error types shared by the whole toolbox.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("csv error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// Structural problems found in an experiment document.
    #[error("invalid experiment configuration:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
    #[error("unknown {category} class `{name}`")]
    UnknownClass { category: &'static str, name: String },
    #[error("invalid config for `{classname}`: {msg}")]
    InvalidConfig { classname: String, msg: String },
    #[error("`{model}` cannot be used with `{dataset}`: {msg}")]
    Incompatible {
        model: String,
        dataset: String,
        msg: String,
    },
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error("no checkpoint found at {0}")]
    CheckpointNotFound(PathBuf),
    #[error("model record error: {0}")]
    Recorder(String),
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Error::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn dataset(msg: impl Into<String>) -> Self {
        Error::Dataset(msg.into())
    }
}

impl From<burn::record::RecorderError> for Error {
    fn from(err: burn::record::RecorderError) -> Self {
        Error::Recorder(format!("{err:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_issue() {
        let err = Error::Validation(vec!["first".into(), "second".into()]);
        let msg = err.to_string();
        assert!(msg.contains("- first"));
        assert!(msg.contains("- second"));
    }

    #[test]
    fn test_unknown_class_message() {
        let err = Error::UnknownClass {
            category: "model",
            name: "models.Nope".into(),
        };
        assert_eq!(err.to_string(), "unknown model class `models.Nope`");
    }
}
