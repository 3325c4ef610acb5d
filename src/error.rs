// error.rs – conversion error taxonomy

use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Every failure is fatal to the conversion; there is no retry or resume.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{context} {path:?}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record {record} in {path:?}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        record: u64,
        reason: String,
    },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "shard {shard} holds {codes} codes ({bytes} bytes), over the {budget} byte shard budget"
    )]
    ShardOverflow {
        shard: usize,
        codes: u64,
        bytes: u64,
        budget: u64,
    },

    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot compute a centroid from an empty corpus")]
    EmptyCorpus,

    #[error("unknown dataset '{0}' in array store")]
    UnknownDataset(String),
}

impl ConvertError {
    pub fn io(context: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        ConvertError::Io {
            context,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
