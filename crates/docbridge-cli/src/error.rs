use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while saving the edited document.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to stage {path}: {source}")]
    Stage { path: PathBuf, source: io::Error },

    #[error("failed to back up {path}: {source}")]
    Backup { path: PathBuf, source: io::Error },

    #[error("failed to replace {path}: {source}")]
    Replace { path: PathBuf, source: io::Error },
}

pub type SaveResult<T> = Result<T, SaveError>;
