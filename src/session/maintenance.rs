//! Background TTL sweep for the session store.
//!
//! Runs independently of request handling. A delayed or skipped sweep only
//! keeps expired sessions around a little longer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::session::store::SessionStore;

/// Statistics from a single sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Number of expired sessions removed.
    pub expired_removed: usize,
    /// Sessions still cached after the sweep.
    pub remaining: usize,
    /// Sweep duration in milliseconds.
    pub duration_ms: u64,
}

/// Periodic task removing sessions older than the store's TTL.
pub struct SessionSweeper {
    store: Arc<SessionStore>,
    interval: Duration,
    enabled: bool,
    shutdown: Arc<Notify>,
}

impl SessionSweeper {
    /// Create a sweeper using the store's configured interval.
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        let config = store.config();
        let interval = config.sweep_interval();
        let enabled = config.sweep_enabled;
        Self {
            store,
            interval,
            enabled,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Override the sweep interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Get a notifier that stops the sweeper when signalled.
    #[must_use]
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the sweep loop as a tokio task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the sweep loop until shutdown is signalled.
    async fn run(&self) {
        if !self.enabled {
            info!("Session sweep is disabled");
            return;
        }

        info!(interval = ?self.interval, "Starting session sweeper");

        loop {
            tokio::select! {
                () = tokio::time::sleep(self.interval) => {
                    let stats = self.run_once();
                    if stats.expired_removed > 0 {
                        info!(
                            expired = stats.expired_removed,
                            remaining = stats.remaining,
                            duration_ms = stats.duration_ms,
                            "Session sweep completed"
                        );
                    } else {
                        debug!(remaining = stats.remaining, "Session sweep found nothing to remove");
                    }
                }
                () = self.shutdown.notified() => {
                    info!("Session sweeper shutting down");
                    break;
                }
            }
        }
    }

    /// Perform a single sweep.
    pub fn run_once(&self) -> SweepStats {
        let start = Instant::now();
        let expired_removed = self.store.remove_old_sessions();

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        SweepStats {
            expired_removed,
            remaining: self.store.len(),
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use chrono::{TimeDelta, Utc};

    use crate::session::config::SessionConfig;
    use crate::session::conversation::ConversationSession;

    fn aged(minutes: i64) -> ConversationSession {
        ConversationSession::with_created_at(
            Vec::new(),
            HashMap::new(),
            Utc::now() - TimeDelta::minutes(minutes),
        )
    }

    #[test]
    fn test_run_once_removes_expired() {
        let store = Arc::new(SessionStore::new(SessionConfig::default()));
        store.set("stale", aged(90));
        store.set("live", aged(10));
        let sweeper = SessionSweeper::new(Arc::clone(&store));

        let stats = sweeper.run_once();

        assert_eq!(stats.expired_removed, 1);
        assert_eq!(stats.remaining, 1);
        assert!(store.get("live").is_some());
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs_and_stops() {
        let store = Arc::new(SessionStore::new(SessionConfig::default()));
        store.set("stale", aged(120));
        let sweeper = SessionSweeper::new(Arc::clone(&store)).with_interval(Duration::from_millis(10));
        let shutdown = sweeper.shutdown_notifier();

        let handle = sweeper.spawn();
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.notify_one();
        handle.await.unwrap();

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_sweeper_exits() {
        let config = SessionConfig::default().with_sweep_enabled(false);
        let store = Arc::new(SessionStore::new(config));
        store.set("stale", aged(120));

        SessionSweeper::new(Arc::clone(&store)).spawn().await.unwrap();

        assert_eq!(store.len(), 1);
    }
}
