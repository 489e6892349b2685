//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::config::ViewerConfig;
use crate::ingest::Ingestor;
use crate::session::SessionStore;
use crate::transcript::{ChatLogParser, TranscriptResult};

/// Shared application state.
pub struct AppState {
    /// Process configuration.
    pub config: ViewerConfig,
    /// Cache of parsed conversations.
    pub store: Arc<SessionStore>,
    /// Upload pipeline.
    pub ingestor: Ingestor,
}

impl AppState {
    /// Create the application state around an existing store.
    ///
    /// # Errors
    /// Returns an error if the transcript parser cannot be built.
    pub fn new(config: ViewerConfig, store: Arc<SessionStore>) -> TranscriptResult<Arc<Self>> {
        let parser = ChatLogParser::new(config.transcript.clone())?;
        let ingestor = Ingestor::new(config.server.tmp_dir.clone(), parser)
            .with_archive_config(config.archive.clone());
        Ok(Arc::new(Self {
            config,
            store,
            ingestor,
        }))
    }
}
