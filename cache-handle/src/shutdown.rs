//! # Termination Watcher
//!
//! Purpose: Close the pool when the process is asked to stop.
//!
//! The watcher never exits the process. It closes the pool and cancels the
//! cache's shutdown token; the host awaits that token and picks its own exit
//! path. Commands in flight when the signal lands are not drained.

use std::future::Future;

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::Cache;

/// Completes on Ctrl+C or SIGTERM.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Spawns a task that closes `cache` on Ctrl+C or SIGTERM.
///
/// Must be called from within a tokio runtime.
pub fn spawn_termination_watcher(cache: &Cache) -> JoinHandle<()> {
    spawn_watcher_on(cache, termination_signal())
}

/// Spawns a task that closes `cache` when `signal` completes.
///
/// The task ends without touching the pool if the cache's shutdown token is
/// cancelled first. Must be called from within a tokio runtime.
pub fn spawn_watcher_on<F>(cache: &Cache, signal: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let pool = cache.pool().clone();
    let token = cache.shutdown_token();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("cache shut down, termination watcher exiting");
            }
            _ = signal => {
                info!("termination requested, closing cache pool");
                pool.close();
                token.cancel();
            }
        }
    })
}
