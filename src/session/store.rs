//! Concurrent, memory-bounded session store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::session::config::SessionConfig;
use crate::session::conversation::ConversationSession;

/// Bytes per mebibyte, for log output.
const MIB: f64 = 1024.0 * 1024.0;

/// Result of a memory-pressure cleanup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvictionStats {
    /// Number of sessions evicted.
    pub removed: usize,
    /// Bytes released by evicted sessions.
    pub removed_bytes: u64,
    /// Aggregate size of the sessions still cached.
    pub remaining_bytes: u64,
}

/// Point-in-time store statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of live sessions.
    pub sessions: usize,
    /// Aggregate size of live sessions.
    pub total_bytes: u64,
    /// Configured memory budget.
    pub capacity_bytes: u64,
}

/// Thread-safe map from session id to cached conversation.
///
/// Reads take a shared lock; every mutation takes the exclusive lock and
/// replaces or removes whole entries.
#[derive(Debug)]
pub struct SessionStore {
    config: SessionConfig,
    sessions: RwLock<HashMap<String, Arc<ConversationSession>>>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Store configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Look up a session.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<ConversationSession>> {
        self.sessions.read().get(id).cloned()
    }

    /// Insert or replace the session for `id`.
    pub fn set(&self, id: impl Into<String>, session: ConversationSession) {
        self.sessions.write().insert(id.into(), Arc::new(session));
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Aggregate size of all live sessions, recomputed from the entries.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        total_size(&self.sessions.read())
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let sessions = self.sessions.read();
        StoreStats {
            sessions: sessions.len(),
            total_bytes: total_size(&sessions),
            capacity_bytes: self.config.max_total_bytes,
        }
    }

    /// Evict oldest sessions until the aggregate size fits the memory budget.
    ///
    /// Candidates are ordered by creation time once per call. Sessions created
    /// at the same instant are evicted in unspecified order.
    pub fn cleanup(&self) -> EvictionStats {
        let capacity = self.config.max_total_bytes;
        let mut sessions = self.sessions.write();
        let mut total = total_size(&sessions);

        if total <= capacity {
            return EvictionStats {
                remaining_bytes: total,
                ..EvictionStats::default()
            };
        }

        let mut candidates: Vec<(String, DateTime<Utc>, u64)> = sessions
            .iter()
            .map(|(id, session)| (id.clone(), session.created_at(), session.size_bytes()))
            .collect();
        candidates.sort_by_key(|(_, created_at, _)| *created_at);

        let mut stats = EvictionStats::default();
        for (id, _, size) in candidates {
            if total <= capacity {
                break;
            }
            sessions.remove(&id);
            total -= size;
            stats.removed += 1;
            stats.removed_bytes += size;
        }
        stats.remaining_bytes = total;
        drop(sessions);

        #[allow(clippy::cast_precision_loss)]
        let (removed_mb, current_mb) = (
            stats.removed_bytes as f64 / MIB,
            stats.remaining_bytes as f64 / MIB,
        );
        info!(
            removed = stats.removed,
            removed_mb,
            current_mb,
            "Memory cleanup triggered"
        );
        stats
    }

    /// Remove every session older than the configured TTL.
    ///
    /// Returns the number of sessions removed.
    pub fn remove_old_sessions(&self) -> usize {
        self.remove_older_than(Utc::now())
    }

    /// Remove every session whose age at `now` exceeds the configured TTL.
    pub fn remove_older_than(&self, now: DateTime<Utc>) -> usize {
        let ttl = TimeDelta::from_std(self.config.ttl()).unwrap_or(TimeDelta::MAX);
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| session.age_at(now) <= ttl);
        let removed = before - sessions.len();
        drop(sessions);

        debug!(removed, "Expired sessions removed");
        removed
    }
}

fn total_size(sessions: &HashMap<String, Arc<ConversationSession>>) -> u64 {
    sessions.values().map(|session| session.size_bytes()).sum()
}
