//! Message records produced by the transcript parser.

use serde::{Deserialize, Serialize};

/// One parsed transcript line.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Timestamp exactly as written in the transcript.
    pub timestamp: String,
    /// Display name of the sender.
    pub sender: String,
    /// Message body, never empty.
    pub text: String,
    /// Relative reference to an extracted image, if one was found on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    /// True when the sender matches the first parsed sender of the transcript.
    pub is_primary_speaker: bool,
}

impl Message {
    /// Whether the message carries an attachment reference.
    #[must_use]
    pub const fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }
}
