use std::future::Future;
use std::io;

/// Resolves on the first signal so the run can stop and report. A second
/// signal runs `force_exit`, for when the drain takes too long.
pub async fn graceful_then_forced<S, Fut, X>(mut next_signal: S, force_exit: X)
where
    S: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = io::Result<()>> + Send + 'static,
    X: FnOnce() + Send + 'static,
{
    if let Err(e) = next_signal().await {
        tracing::error!(error = %e, "failed to listen for interrupt");
        std::future::pending::<()>().await;
    }
    tracing::warn!("interrupt received, stopping early; interrupt again to exit immediately");

    tokio::spawn(async move {
        if next_signal().await.is_ok() {
            tracing::error!("second interrupt, exiting without a report");
            force_exit();
        }
    });
}
