//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl-C)
//! - Translate it into a `Shutdown` trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failed handler install is logged and never triggers shutdown

use crate::lifecycle::Shutdown;

/// Resolve once Ctrl-C arrives. Pends forever if the handler cannot be installed.
pub async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Spawn a task that triggers `shutdown` on Ctrl-C.
pub fn spawn_signal_listener(shutdown: std::sync::Arc<Shutdown>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_ctrl_c().await;
        let notified = shutdown.trigger();
        tracing::debug!(tasks = notified, "Shutdown broadcast");
    })
}
