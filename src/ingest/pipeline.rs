//! Extract, parse and materialise an uploaded chat export.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::archive::{ArchiveConfig, extract_archive};
use crate::ingest::error::{IngestError, IngestResult};
use crate::session::ConversationSession;
use crate::transcript::{ChatLogParser, Message};

/// File name the uploaded bytes are written to inside the scratch directory.
const UPLOAD_FILE_NAME: &str = "upload.zip";
/// Subdirectory of the scratch directory receiving extracted entries.
const EXTRACT_DIR_NAME: &str = "extracted";
/// Prefix for per-upload scratch directories.
const SCRATCH_PREFIX: &str = "chat";

/// Turns uploaded archives into [`ConversationSession`]s.
///
/// Each upload gets its own scratch directory under `tmp_dir`, removed on
/// every exit path.
#[derive(Clone, Debug)]
pub struct Ingestor {
    tmp_dir: PathBuf,
    parser: ChatLogParser,
    limits: ArchiveConfig,
}

impl Ingestor {
    /// Create an ingestor writing scratch data below `tmp_dir`.
    #[must_use]
    pub fn new(tmp_dir: impl Into<PathBuf>, parser: ChatLogParser) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
            parser,
            limits: ArchiveConfig::default(),
        }
    }

    /// Replace the extraction size limits.
    #[must_use]
    pub fn with_archive_config(mut self, limits: ArchiveConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Root directory for scratch data.
    #[must_use]
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Ingest an uploaded archive held in memory.
    ///
    /// # Errors
    /// Returns an error if the scratch directory cannot be prepared, or if
    /// extraction, parsing or attachment loading fails.
    pub fn ingest(&self, upload: &[u8]) -> IngestResult<ConversationSession> {
        fs::create_dir_all(&self.tmp_dir).map_err(IngestError::Workspace)?;
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.tmp_dir)
            .map_err(IngestError::Workspace)?;

        let archive_path = scratch.path().join(UPLOAD_FILE_NAME);
        fs::write(&archive_path, upload).map_err(IngestError::Workspace)?;

        let session = self.ingest_file(&archive_path, &scratch.path().join(EXTRACT_DIR_NAME));
        if let Err(err) = scratch.close() {
            warn!(%err, "Failed to remove scratch directory");
        }
        session
    }

    /// Ingest an archive already on disk, extracting into `extract_root`.
    ///
    /// The caller owns `extract_root` and its cleanup.
    ///
    /// # Errors
    /// Returns an error if extraction, parsing or attachment loading fails.
    pub fn ingest_file(&self, archive: &Path, extract_root: &Path) -> IngestResult<ConversationSession> {
        let extraction = extract_archive(archive, extract_root, &self.limits)?;
        let transcript = extraction.transcript.ok_or(IngestError::MissingTranscript)?;
        let media_dir = transcript.parent().unwrap_or(extract_root);

        let messages = self.parser.parse(&transcript, media_dir, extract_root)?;
        let attachments = load_attachments(extract_root, &messages)?;
        let session = ConversationSession::new(messages, attachments);

        info!(
            messages = session.messages().len(),
            attachments = session.attachments().len(),
            size_bytes = session.size_bytes(),
            "Conversation ingested"
        );
        Ok(session)
    }
}

/// Read every referenced attachment once.
fn load_attachments(root: &Path, messages: &[Message]) -> IngestResult<HashMap<String, Vec<u8>>> {
    let mut attachments = HashMap::new();
    for reference in messages.iter().filter_map(|m| m.attachment.as_deref()) {
        if attachments.contains_key(reference) {
            continue;
        }
        let path = root.join(reference);
        let bytes = fs::read(&path).map_err(|source| IngestError::AttachmentRead { path, source })?;
        attachments.insert(reference.to_string(), bytes);
    }
    Ok(attachments)
}
