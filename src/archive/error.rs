//! Error types for archive extraction.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while unpacking an uploaded archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The container could not be opened or one of its entries could not be read.
    #[error("corrupt archive: {0}")]
    CorruptArchive(#[from] zip::result::ZipError),

    /// An entry name would place it outside the destination directory.
    #[error("illegal file path: {0}")]
    IllegalEntryPath(String),

    /// An entry inflated past a configured size cap.
    #[error("entry {entry} exceeds the {limit} byte extraction limit")]
    TooLarge {
        /// Name of the entry being extracted when the cap was hit.
        entry: String,
        /// The cap that was exceeded.
        limit: u64,
    },

    /// Writing an extracted entry to disk failed.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailure {
        /// Target path of the entry being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn write_failure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }

    /// Whether the error comes from the uploaded content rather than local storage.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::CorruptArchive(_) | Self::IllegalEntryPath(_) | Self::TooLarge { .. }
        )
    }
}

/// Convenience result alias for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
