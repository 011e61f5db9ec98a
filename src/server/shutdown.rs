//! Graceful shutdown for the sentinel
//!
//! On SIGTERM/SIGINT the listener stops accepting and in-flight health
//! requests are allowed to finish.

use tokio::sync::watch;
use tracing::info;

/// Receiving half, cloned into every component that must stop
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown is triggered or the controller is dropped
    pub async fn wait(&mut self) {
        // Err means the controller is gone, which also ends the wait
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }

    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
        info!("Shutdown signal sent");
    }
}

pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownController { sender }, ShutdownSignal { receiver })
}

/// Wait for SIGTERM or SIGINT, returning the signal name
///
/// Fails only if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!(signal = name, "Received termination signal");
    Ok(name)
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    Ok("CTRL_C")
}
