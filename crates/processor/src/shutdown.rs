//! Cooperative shutdown handle
//!
//! One flag is shared by the signal listener, the topic gate and the
//! consume loop. It starts out running and, once cleared, stays cleared.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shared "keep running" flag
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    running: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Create a handle in the running state
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Check if running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the flag for every clone of this handle
    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a task that clears `signal` on SIGINT or SIGTERM
///
/// The flag is stored before anything is logged; the loops notice the
/// cleared flag on their next check.
pub fn spawn_signal_listener(signal: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(shutdown_on(wait_for_signal(), signal))
}

async fn shutdown_on<F: Future<Output = ()>>(trigger: F, signal: ShutdownSignal) {
    trigger.await;
    signal.request_shutdown();
    info!("Termination signal received; shutting down");
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_running() {
        assert!(ShutdownSignal::new().is_running());
        assert!(ShutdownSignal::default().is_running());
    }

    #[test]
    fn test_shutdown_is_shared_and_sticky() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();

        clone.request_shutdown();
        assert!(!signal.is_running());

        clone.request_shutdown();
        assert!(!signal.is_running());
    }

    #[tokio::test]
    async fn test_listener_clears_flag_once_triggered() {
        let signal = ShutdownSignal::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let listener = tokio::spawn(shutdown_on(
            async move {
                let _ = rx.await;
            },
            signal.clone(),
        ));
        tokio::task::yield_now().await;
        assert!(signal.is_running());

        tx.send(()).unwrap();
        listener.await.unwrap();
        assert!(!signal.is_running());
    }
}
