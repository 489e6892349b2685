//! Transcript parsing for exported chat logs.
//!
//! A transcript is a plain-text file with one message per line in the form
//! `"<timestamp> - <sender>: <text>"`. Lines that do not follow the form are
//! skipped, and inline image filenames are resolved against the extracted
//! media directory.

pub mod error;
pub mod message;
pub mod parser;

pub use error::{TranscriptError, TranscriptResult};
pub use message::Message;
pub use parser::{ChatLogParser, TranscriptConfig};
