//! Ctrl-C / SIGTERM handling for long-running commands.
//!
//! `recover` and `serve` watch the returned [`CancellationToken`]. A batch
//! stops after the record in flight; the server stops accepting connections
//! and drains.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn a task that cancels the returned token on SIGINT or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler; Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
            info!("received SIGINT (Ctrl-C), stopping after current record");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT (Ctrl-C), stopping after current record");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, stopping after current record");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl-C, stopping after current record");
}
