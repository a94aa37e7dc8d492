use std::path::PathBuf;

use thiserror::Error;

/// Failures of archive operations.
///
/// None of these are recoverable in place: after any of them the archive must
/// be discarded and recreated from the last known-good copy.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("no such entry in archive: {0}")]
    NotFound(String),

    #[error("entry is a directory, not a file: {0}")]
    NotAFile(String),

    #[error("entry {path} conflicts with existing {existing}")]
    Conflict { path: String, existing: String },

    #[error("source is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path { path: PathBuf },

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
