//! Cached conversation record.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::transcript::Message;

/// A fully materialised parse result held in memory.
///
/// Immutable after construction; `size_bytes` is computed once from the
/// attachment payloads.
#[derive(Clone, Debug)]
pub struct ConversationSession {
    messages: Vec<Message>,
    attachments: HashMap<String, Vec<u8>>,
    created_at: DateTime<Utc>,
    size_bytes: u64,
}

impl ConversationSession {
    /// Build a session stamped with the current time.
    #[must_use]
    pub fn new(messages: Vec<Message>, attachments: HashMap<String, Vec<u8>>) -> Self {
        Self::with_created_at(messages, attachments, Utc::now())
    }

    /// Build a session with an explicit creation time.
    #[must_use]
    pub fn with_created_at(
        messages: Vec<Message>,
        attachments: HashMap<String, Vec<u8>>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let size_bytes = attachments.values().map(|bytes| bytes.len() as u64).sum();
        Self {
            messages,
            attachments,
            created_at,
            size_bytes,
        }
    }

    /// Messages in transcript order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// All attachment payloads keyed by reference.
    #[must_use]
    pub const fn attachments(&self) -> &HashMap<String, Vec<u8>> {
        &self.attachments
    }

    /// Payload for a single attachment reference.
    #[must_use]
    pub fn attachment(&self, reference: &str) -> Option<&[u8]> {
        self.attachments.get(reference).map(Vec::as_slice)
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Sum of all attachment byte lengths.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Age of the session relative to `now`.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.created_at)
    }
}
