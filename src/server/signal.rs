// Shutdown signal handling
//
// SIGTERM and SIGINT (Ctrl+C) stop the accept loop. On non-Unix targets only Ctrl+C is watched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Signal handler state
#[derive(Debug, Default)]
pub struct SignalHandler {
    /// Shutdown signal (SIGTERM, SIGINT), awaited by the server loop
    pub shutdown: Arc<Notify>,
    /// Whether shutdown has been requested
    shutdown_requested: AtomicBool,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the server loop to stop
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        // a stored permit survives until the loop next polls
        self.shutdown.notify_one();
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}

/// Start signal handlers (Unix).
///
/// Spawns a task that waits for the first SIGTERM or SIGINT and then calls
/// `request_shutdown`. If the handlers cannot be registered the error is
/// logged and the server runs until killed.
///
/// # Arguments
///
/// * `handler` - Shared state notified on shutdown
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!("Failed to register signal handlers: {e}");
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
            _ = sigint.recv() => tracing::info!("SIGINT received, shutting down"),
        }
        handler.request_shutdown();
    });
}

/// Start the Ctrl+C handler (non-Unix)
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl+C received, shutting down");
                handler.request_shutdown();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {e}"),
        }
    });
}
