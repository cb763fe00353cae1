//! Process shutdown signals.
//!
//! A signal whose handler cannot be installed is logged and ignored: it must never look like
//! a shutdown request, or the watchdog would stop before its first cycle.

use std::{future::Future, io};

use tokio::signal::unix::{signal as unix_signal, SignalKind};

/// Completes on the first SIGTERM or SIGINT.
pub async fn signal() {
    let terminate = or_pending("SIGTERM", async {
        unix_signal(SignalKind::terminate())?.recv().await;
        Ok::<_, io::Error>(())
    });
    let interrupt = or_pending("SIGINT", tokio::signal::ctrl_c());

    tokio::select! {
        _ = terminate => tracing::info!("received SIGTERM"),
        _ = interrupt => tracing::info!("received SIGINT"),
    }
}

/// Awaits `listener`. If it fails, logs the error and never completes.
pub async fn or_pending<F>(name: &'static str, listener: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = listener.await {
        tracing::warn!(signal = name, error = %e, "cannot listen for signal, ignoring it");
        std::future::pending::<()>().await;
    }
}
