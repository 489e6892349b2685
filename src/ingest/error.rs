//! Error types for the ingestion pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::transcript::TranscriptError;

/// Errors that abort an upload. No session is created when one occurs.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Extraction failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Transcript parsing failed.
    #[error(transparent)]
    Transcript(#[from] TranscriptError),

    /// The archive held no `.txt` transcript.
    #[error("archive contains no transcript")]
    MissingTranscript,

    /// An attachment found during parsing could not be loaded.
    #[error("cannot read attachment {}: {source}", .path.display())]
    AttachmentRead {
        /// Attachment path on disk.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The scratch directory could not be prepared.
    #[error("scratch directory error: {0}")]
    Workspace(#[source] std::io::Error),
}

impl IngestError {
    /// Whether the failure was caused by the uploaded content.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::Archive(err) => err.is_input_error(),
            Self::Transcript(err) => matches!(
                err,
                TranscriptError::TranscriptUnreadable { .. } | TranscriptError::LineTooLong { .. }
            ),
            Self::MissingTranscript => true,
            Self::AttachmentRead { .. } | Self::Workspace(_) => false,
        }
    }
}

/// Convenience result alias for ingestion.
pub type IngestResult<T> = Result<T, IngestError>;
