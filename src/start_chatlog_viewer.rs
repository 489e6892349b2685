//! Startup helpers for the chat log viewer server.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ViewerConfig;
use crate::server::{self, AppState};
use crate::session::{SessionStore, SessionSweeper};

/// Run the server until Ctrl-C (used by the `chatlog-viewer` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();
    info!("Starting chat log viewer v{}", env!("CARGO_PKG_VERSION"));

    match bootstrap() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `CHATLOG_LOG_LEVEL` (default `info`)
/// is used. `CHATLOG_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let level = std::env::var("CHATLOG_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = std::env::var("CHATLOG_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let _ = if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
}

fn bootstrap() -> anyhow::Result<()> {
    let config = ViewerConfig::from_env().context("Failed to load configuration")?;
    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    rt.block_on(serve(config, shutdown_signal()))
}

/// Build the store, start the TTL sweeper and serve until `shutdown_signal` completes.
///
/// The sweeper is stopped once the server has drained.
///
/// # Errors
/// Returns an error if state creation fails or the server cannot run.
pub async fn serve<F>(config: ViewerConfig, shutdown_signal: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(
        port = config.server.port,
        tmp_dir = %config.server.tmp_dir.display(),
        max_memory_bytes = config.sessions.max_total_bytes,
        ttl_seconds = config.sessions.ttl_seconds,
        "Configuration loaded"
    );

    let store = Arc::new(SessionStore::new(config.sessions.clone()));
    let state = AppState::new(config, Arc::clone(&store)).context("Failed to create state")?;

    let sweeper = SessionSweeper::new(store);
    let stop_sweeper = sweeper.shutdown_notifier();
    let sweep_task = sweeper.spawn();

    let result = server::run_server_with_shutdown(state, shutdown_signal)
        .await
        .context("Server error");

    stop_sweeper.notify_one();
    if let Err(err) = sweep_task.await {
        warn!(%err, "Session sweeper task failed");
    }
    result
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "Cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
