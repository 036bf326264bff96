use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors surfaced by the comparison engine.
///
/// None of these are retried internally: a failed run produces no partial
/// report, and the caller decides whether to start the comparison over.
#[derive(Error, Debug)]
pub enum CompareError {
    /// A file could not be opened or read.
    #[error("failed to access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The signature size is out of range or cannot work against these files.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The mode name is not one of the defined comparison modes.
    #[error("unrecognized mode {0:?} (expected \"precise\" or \"fast\")")]
    UnsupportedMode(String),

    /// A background scan task died before completing.
    #[error("scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CompareError {
    pub(crate) fn file_access(path: &Path, source: std::io::Error) -> Self {
        CompareError::FileAccess {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompareError>;
