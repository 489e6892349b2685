//! Upload ingestion: archive bytes in, cached conversation out.

pub mod error;
pub mod pipeline;

pub use error::{IngestError, IngestResult};
pub use pipeline::Ingestor;
