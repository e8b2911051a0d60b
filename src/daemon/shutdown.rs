use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Waits for a termination request (Ctrl-C, or SIGTERM on unix) and cancels `cancelation`.
///
/// On Windows detached processes can't detect signals sent to them, so there only Ctrl-C works.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C {e:?}");
                return;
            }
            info!("Received Ctrl-C");
        },
        _ = terminate() => {
            info!("Received termination request");
        },
    };
    cancelation.cancel();
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("Failed to listen for SIGTERM {e:?}");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
