//! Error types for transcript parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading a transcript.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// The transcript file could not be opened.
    #[error("cannot open transcript {}: {source}", .path.display())]
    TranscriptUnreadable {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The line scan failed while reading.
    #[error("transcript scan failed: {0}")]
    ScanFailure(#[source] std::io::Error),

    /// A single line exceeded the configured buffer cap.
    #[error("transcript line {line} exceeds {limit} bytes")]
    LineTooLong {
        /// One-based line number.
        line: usize,
        /// Configured cap in bytes.
        limit: usize,
    },

    /// The attachment pattern failed to compile.
    #[error("invalid attachment pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl TranscriptError {
    /// Whether the error was raised by the line scan, including buffer overflow.
    #[must_use]
    pub const fn is_scan_failure(&self) -> bool {
        matches!(self, Self::ScanFailure(_) | Self::LineTooLong { .. })
    }
}

/// Convenience result alias for transcript operations.
pub type TranscriptResult<T> = Result<T, TranscriptError>;
