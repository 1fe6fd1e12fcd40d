#[cfg(not(target_os = "windows"))]
use tokio::signal::unix::{SignalKind, signal};

/// Fires `sender` on SIGTERM or Ctrl-C, whichever comes first.
pub fn create_term_signal_handler(sender: tokio::sync::oneshot::Sender<()>) {
    tokio::spawn(async move {
        tokio::select! {
            _ = terminate() => tracing::info!("got terminate signal"),
            _ = interrupt() => tracing::info!("got interrupt signal"),
        }

        let _: Result<(), _> = sender.send(());
    });
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("ctrl-c handler error: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(not(target_os = "windows"))]
async fn terminate() {
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            tracing::info!("register terminate signal handler");

            stream.recv().await;
        }
        Err(e) => {
            tracing::error!("signal error: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(target_os = "windows")]
async fn terminate() {
    std::future::pending::<()>().await
}
