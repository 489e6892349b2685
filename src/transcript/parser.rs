//! Line-oriented transcript parser with attachment resolution.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Component, Path};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::transcript::error::{TranscriptError, TranscriptResult};
use crate::transcript::message::Message;

/// Separator between the timestamp and the rest of a line.
const TIMESTAMP_SEPARATOR: &str = " - ";
/// Separator between the sender and the message body.
const SENDER_SEPARATOR: &str = ": ";
/// Placeholder body emitted by export tools for deleted or system entries.
const NULL_BODY: &str = "null";
/// Image filenames, optionally wrapped in bidi or BOM marks.
const ATTACHMENT_PATTERN: &str = r"(?i)[\w\-.\x{200E}\x{200F}\x{FEFF}]+\.(?:jpg|jpeg|png|gif|webp)";
/// Left-to-right mark, right-to-left mark and byte-order mark.
const INVISIBLE_MARKS: [char; 3] = ['\u{200E}', '\u{200F}', '\u{FEFF}'];

/// Transcript parsing settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Longest accepted line in bytes, excluding the line terminator.
    pub max_line_bytes: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: 1024 * 1024, // 1 MiB
        }
    }
}

/// Parser turning a transcript file into ordered [`Message`] records.
#[derive(Clone, Debug)]
pub struct ChatLogParser {
    config: TranscriptConfig,
    attachment_pattern: Regex,
}

impl ChatLogParser {
    /// Create a parser with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the attachment pattern fails to compile.
    pub fn new(config: TranscriptConfig) -> TranscriptResult<Self> {
        Ok(Self {
            config,
            attachment_pattern: Regex::new(ATTACHMENT_PATTERN)?,
        })
    }

    /// Create a parser with default settings.
    ///
    /// # Errors
    /// Returns an error if the attachment pattern fails to compile.
    pub fn with_defaults() -> TranscriptResult<Self> {
        Self::new(TranscriptConfig::default())
    }

    /// Parse the transcript at `transcript`.
    ///
    /// Image filenames are looked up in `media_dir`; references to files that
    /// exist are recorded relative to `attachment_root`.
    ///
    /// # Errors
    /// Returns [`TranscriptError::TranscriptUnreadable`] if the file cannot be
    /// opened and a scan failure if reading a line fails or overflows the cap.
    pub fn parse(
        &self,
        transcript: &Path,
        media_dir: &Path,
        attachment_root: &Path,
    ) -> TranscriptResult<Vec<Message>> {
        debug!(file = %transcript.display(), "Parsing transcript");

        let file = File::open(transcript).map_err(|source| {
            warn!(err = %source, file = %transcript.display(), "Failed to open transcript");
            TranscriptError::TranscriptUnreadable {
                path: transcript.to_path_buf(),
                source,
            }
        })?;

        let messages = self.parse_reader(BufReader::new(file), media_dir, attachment_root)?;

        info!(
            file = %transcript.display(),
            messages = messages.len(),
            attachments = messages.iter().filter(|m| m.has_attachment()).count(),
            "Transcript parsing completed"
        );
        Ok(messages)
    }

    /// Parse transcript lines from any buffered reader.
    ///
    /// # Errors
    /// Returns a scan failure if reading fails or a line exceeds the cap.
    pub fn parse_reader<R: BufRead>(
        &self,
        mut reader: R,
        media_dir: &Path,
        attachment_root: &Path,
    ) -> TranscriptResult<Vec<Message>> {
        let mut messages = Vec::new();
        let mut primary_speaker: Option<String> = None;
        let mut buf = Vec::new();
        let mut line_number = 0;

        while read_line(&mut reader, &mut buf, self.config.max_line_bytes, line_number + 1)? {
            line_number += 1;
            let line = String::from_utf8_lossy(&buf);

            // Continuation lines of multi-line messages are dropped here.
            let Some((timestamp, sender, text)) = split_line(&line) else {
                continue;
            };

            let primary = primary_speaker.get_or_insert_with(|| sender.to_string());
            let is_primary_speaker = primary.as_str() == sender;

            messages.push(Message {
                timestamp: timestamp.to_string(),
                sender: sender.to_string(),
                text: text.to_string(),
                attachment: self.resolve_attachment(text, media_dir, attachment_root),
                is_primary_speaker,
            });
        }

        Ok(messages)
    }

    /// Find the first image filename in `text` and resolve it on disk.
    fn resolve_attachment(&self, text: &str, media_dir: &Path, attachment_root: &Path) -> Option<String> {
        let matched = self.attachment_pattern.find(text)?;
        let cleaned: String = matched
            .as_str()
            .chars()
            .filter(|c| !INVISIBLE_MARKS.contains(c))
            .collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return None;
        }

        let candidate = media_dir.join(cleaned);
        if !candidate.is_file() {
            debug!(file = %candidate.display(), "Referenced attachment not found");
            return None;
        }

        relative_reference(attachment_root, &candidate)
    }
}

/// Split a line into `(timestamp, sender, text)`.
///
/// Both separators split on their first occurrence. Lines with an empty or
/// `null` body are rejected.
fn split_line(line: &str) -> Option<(&str, &str, &str)> {
    let (timestamp, rest) = line.split_once(TIMESTAMP_SEPARATOR)?;
    let (sender, text) = rest.split_once(SENDER_SEPARATOR)?;
    if text.is_empty() || text == NULL_BODY {
        return None;
    }
    Some((timestamp, sender, text))
}

/// Read one line into `buf` without its terminator.
///
/// At most `limit` bytes plus a `\r\n` terminator are pulled from the
/// reader per call. Returns `false` at end of input.
fn read_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
    line_number: usize,
) -> TranscriptResult<bool> {
    buf.clear();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(2);
    let read = reader
        .by_ref()
        .take(cap)
        .read_until(b'\n', buf)
        .map_err(TranscriptError::ScanFailure)?;
    if read == 0 {
        return Ok(false);
    }

    let terminated = buf.last() == Some(&b'\n');
    if terminated {
        buf.pop();
    } else if u64::try_from(read).unwrap_or(u64::MAX) >= cap {
        return Err(TranscriptError::LineTooLong {
            line: line_number,
            limit,
        });
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    if buf.len() > limit {
        return Err(TranscriptError::LineTooLong {
            line: line_number,
            limit,
        });
    }
    Ok(true)
}

/// Express `path` relative to `root` with `/` separators.
fn relative_reference(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
