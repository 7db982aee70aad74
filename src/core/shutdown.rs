use tokio::signal;
use tokio::sync::watch;

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

/// Waits for a shutdown signal and forwards it to background loops before
/// letting the HTTP server drain.
pub(crate) async fn propagate_shutdown(background: watch::Sender<bool>) {
    shutdown_signal().await;
    if background.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }
}
