//! Size limits applied while unpacking an upload.

use serde::{Deserialize, Serialize};

/// Default cap on a single decompressed entry (100 MB).
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 100_000_000;
/// Default cap on all decompressed entries of one archive (1 GiB).
pub const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 1024 * 1024 * 1024;

/// Extraction limits.
///
/// Both caps count decompressed bytes as they are written, so a small
/// archive that inflates past either limit is stopped mid-entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Largest decompressed size allowed for any one entry.
    pub max_entry_bytes: u64,
    /// Largest decompressed size allowed across the whole archive.
    pub max_extracted_bytes: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            max_extracted_bytes: DEFAULT_MAX_EXTRACTED_BYTES,
        }
    }
}

impl ArchiveConfig {
    /// Set the per-entry cap.
    #[must_use]
    pub const fn with_max_entry_bytes(mut self, bytes: u64) -> Self {
        self.max_entry_bytes = bytes;
        self
    }

    /// Set the whole-archive cap.
    #[must_use]
    pub const fn with_max_extracted_bytes(mut self, bytes: u64) -> Self {
        self.max_extracted_bytes = bytes;
        self
    }
}
