//! OS signal listener feeding the shared cancellation token

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix;

    match unix::signal(unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
            log::info!("⚠️  Received SIGTERM");
        }
        Err(e) => {
            log::error!("❌ Failed to listen for SIGTERM: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}

/// Cancel `cancel` on ctrl-c or SIGTERM. The task also ends quietly if the
/// token is cancelled from elsewhere.
pub fn spawn_signal_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = wait_for_sigterm() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => log::info!("⚠️  Received CTRL+C"),
                Err(e) => {
                    log::error!("❌ Failed to listen for CTRL+C: {}", e);
                    return;
                }
            },
        }
        log::info!("🛑 Shutting down: finishing current unit of work...");
        cancel.cancel();
    })
}
