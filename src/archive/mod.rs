//! Archive extraction for uploaded chat exports.
//!
//! Unpacks an untrusted ZIP container onto local storage, refusing any entry
//! whose name would resolve outside the destination root, and reports which
//! extracted file holds the transcript.

pub mod config;
pub mod error;
pub mod extractor;

pub use config::ArchiveConfig;
pub use error::{ArchiveError, ArchiveResult};
pub use extractor::{Extraction, extract_archive};
