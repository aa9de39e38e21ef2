//! Shutdown signal handling
//!
//! SIGINT (Ctrl+C) everywhere, SIGTERM as well on unix.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Resolves once the process is asked to stop
pub async fn wait_for_shutdown() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}; only Ctrl+C stops the service", e);
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("SIGINT received"),
        _ = terminate => info!("SIGTERM received"),
    }
}

/// Cancel `token` once a shutdown signal arrives.
///
/// Returns immediately; the signal is awaited on a background task, which
/// also exits if the token is cancelled by someone else first.
pub fn cancel_on_shutdown(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutting down");
                token.cancel();
            },
            _ = token.cancelled() => {},
        }
    });
}
