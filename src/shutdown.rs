use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on SIGINT or SIGTERM; returns early if it is cancelled elsewhere
pub async fn watch_signals(cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = interrupt() => {
            log::info!("Interrupt signal received, shutting down gracefully...");
        }
    }
    cancel.cancel();
}

#[cfg(unix)]
async fn interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            _ = ctrl_c() => {}
            _ = terminate.recv() => {}
        },
        Err(e) => {
            log::error!("Failed to listen for SIGTERM: {}", e);
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn interrupt() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
}
