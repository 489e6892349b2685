//! Process configuration for the chat log viewer.
//!
//! Values come from `CHATLOG_*` environment variables, falling back to
//! defaults for anything unset.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::ArchiveConfig;
use crate::session::SessionConfig;
use crate::transcript::TranscriptConfig;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default upload size limit (256 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// An environment variable could not be parsed.
    #[error("cannot parse {key}={value:?}")]
    Parse {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
}

/// Convenience result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Extraction size limits.
    pub archive: ArchiveConfig,
    /// Session cache settings.
    pub sessions: SessionConfig,
    /// Transcript parsing settings.
    pub transcript: TranscriptConfig,
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Directory holding per-upload scratch directories.
    pub tmp_dir: PathBuf,
    /// Largest accepted upload body in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            tmp_dir: PathBuf::from("tmp"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ViewerConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or a value is invalid.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parse_var(&lookup, "CHATLOG_PORT")? {
            config.server.port = port;
        }
        if let Some(dir) = lookup("CHATLOG_TMP_DIR").filter(|v| !v.trim().is_empty()) {
            config.server.tmp_dir = PathBuf::from(dir);
        }
        if let Some(bytes) = parse_var(&lookup, "CHATLOG_MAX_UPLOAD_BYTES")? {
            config.server.max_upload_bytes = bytes;
        }
        if let Some(bytes) = parse_var(&lookup, "CHATLOG_MAX_ENTRY_BYTES")? {
            config.archive.max_entry_bytes = bytes;
        }
        if let Some(bytes) = parse_var(&lookup, "CHATLOG_MAX_EXTRACTED_BYTES")? {
            config.archive.max_extracted_bytes = bytes;
        }
        if let Some(bytes) = parse_var(&lookup, "CHATLOG_MAX_MEMORY_BYTES")? {
            config.sessions.max_total_bytes = bytes;
        }
        if let Some(secs) = parse_var(&lookup, "CHATLOG_SESSION_TTL_SECS")? {
            config.sessions.ttl_seconds = secs;
        }
        if let Some(secs) = parse_var(&lookup, "CHATLOG_SWEEP_INTERVAL_SECS")? {
            config.sessions.sweep_interval_seconds = secs;
        }
        if let Some(enabled) = parse_var(&lookup, "CHATLOG_SWEEP_ENABLED")? {
            config.sessions.sweep_enabled = enabled;
        }
        if let Some(bytes) = parse_var(&lookup, "CHATLOG_MAX_LINE_BYTES")? {
            config.transcript.max_line_bytes = bytes;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the HTTP port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Set the scratch directory root.
    #[must_use]
    pub fn with_tmp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.server.tmp_dir = dir.into();
        self
    }

    /// Replace the session cache settings.
    #[must_use]
    pub fn with_sessions(mut self, sessions: SessionConfig) -> Self {
        self.sessions = sessions;
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any value is zero where a positive value is required.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_upload_bytes must be > 0".to_string()));
        }
        if self.archive.max_entry_bytes == 0 {
            return Err(ConfigError::Invalid("archive.max_entry_bytes must be > 0".to_string()));
        }
        if self.archive.max_extracted_bytes == 0 {
            return Err(ConfigError::Invalid("archive.max_extracted_bytes must be > 0".to_string()));
        }
        if self.sessions.max_total_bytes == 0 {
            return Err(ConfigError::Invalid("sessions.max_total_bytes must be > 0".to_string()));
        }
        if self.sessions.ttl_seconds == 0 {
            return Err(ConfigError::Invalid("sessions.ttl_seconds must be > 0".to_string()));
        }
        if self.sessions.sweep_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "sessions.sweep_interval_seconds must be > 0".to_string(),
            ));
        }
        if self.transcript.max_line_bytes == 0 {
            return Err(ConfigError::Invalid("transcript.max_line_bytes must be > 0".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| ConfigError::Parse {
        key: key.to_string(),
        value: raw.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.tmp_dir, PathBuf::from("tmp"));
        assert_eq!(config.archive.max_entry_bytes, 100_000_000);
        assert_eq!(config.archive.max_extracted_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.sessions.max_total_bytes, 500 * 1024 * 1024);
        assert_eq!(config.sessions.ttl_seconds, 3600);
        assert_eq!(config.sessions.sweep_interval_seconds, 900);
        assert_eq!(config.transcript.max_line_bytes, 1024 * 1024);
    }

    #[test]
    fn test_env_overrides() {
        let config = ViewerConfig::from_lookup(lookup_from(&[
            ("CHATLOG_PORT", "8080"),
            ("CHATLOG_TMP_DIR", "/var/tmp/chat"),
            ("CHATLOG_MAX_MEMORY_BYTES", "1048576"),
            ("CHATLOG_MAX_ENTRY_BYTES", "4096"),
            ("CHATLOG_MAX_EXTRACTED_BYTES", "65536"),
            ("CHATLOG_SESSION_TTL_SECS", " 120 "),
            ("CHATLOG_SWEEP_ENABLED", "false"),
            ("CHATLOG_MAX_LINE_BYTES", ""),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.tmp_dir, PathBuf::from("/var/tmp/chat"));
        assert_eq!(config.sessions.max_total_bytes, 1_048_576);
        assert_eq!(config.archive.max_entry_bytes, 4096);
        assert_eq!(config.archive.max_extracted_bytes, 65_536);
        assert_eq!(config.sessions.ttl_seconds, 120);
        assert!(!config.sessions.sweep_enabled);
        assert_eq!(config.transcript.max_line_bytes, 1024 * 1024);
    }

    #[test]
    fn test_parse_error() {
        let err = ViewerConfig::from_lookup(lookup_from(&[("CHATLOG_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref key, .. } if key == "CHATLOG_PORT"));
    }

    #[test]
    fn test_zero_ttl_is_invalid() {
        let err =
            ViewerConfig::from_lookup(lookup_from(&[("CHATLOG_SESSION_TTL_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_extraction_cap_is_invalid() {
        for key in ["CHATLOG_MAX_ENTRY_BYTES", "CHATLOG_MAX_EXTRACTED_BYTES"] {
            let err = ViewerConfig::from_lookup(lookup_from(&[(key, "0")])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{key}");
        }
    }

    #[test]
    fn test_builder_methods() {
        let config = ViewerConfig::default()
            .with_port(9000)
            .with_tmp_dir("/tmp/x")
            .with_sessions(SessionConfig::default().with_max_total_bytes(10));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.tmp_dir, PathBuf::from("/tmp/x"));
        assert_eq!(config.sessions.max_total_bytes, 10);
        assert!(config.validate().is_ok());
    }
}
