//! Signal handling and graceful shutdown support
//!
//! Supports SIGINT (Ctrl+C), SIGTERM (kill/Kubernetes/Docker), SIGHUP and SIGQUIT.
//! A running job subscribes to a [`ShutdownCoordinator`]; when a signal arrives it
//! stops intake and discards its open windows without emitting them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gearshift::server::shutdown::ShutdownCoordinator;
//!
//! # async fn example() {
//! let coordinator = ShutdownCoordinator::new();
//! let rx = coordinator.subscribe();
//!
//! let watcher = coordinator.clone();
//! tokio::spawn(async move { watcher.wait_for_signal().await });
//!
//! // hand `rx` to GearChangeJob::run(...)
//! # drop(rx);
//! # }
//! ```

use log::{error, info, warn};
use std::fmt;
use tokio::sync::broadcast;

/// The type of shutdown signal received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT - User interrupt (Ctrl+C)
    Interrupt,
    /// SIGTERM - Termination request (kill, Kubernetes, Docker)
    Terminate,
    /// SIGHUP - Terminal hangup
    Hangup,
    /// SIGQUIT - Quit (Ctrl+\)
    Quit,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT (Ctrl+C)"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Hangup => write!(f, "SIGHUP"),
            ShutdownSignal::Quit => write!(f, "SIGQUIT"),
        }
    }
}

/// Wait for any shutdown signal (SIGINT, SIGTERM, SIGHUP, SIGQUIT).
///
/// If the handlers cannot be installed this logs an error and never resolves.
#[cfg(unix)]
pub async fn shutdown_signal() -> ShutdownSignal {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::hangup()),
        signal(SignalKind::quit()),
    );
    let (mut sigterm, mut sigint, mut sighup, mut sigquit) = match handlers {
        (Ok(term), Ok(int), Ok(hup), Ok(quit)) => (term, int, hup, quit),
        _ => {
            error!("Failed to install signal handlers; shutdown signals will be ignored");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM - initiating graceful shutdown");
            ShutdownSignal::Terminate
        }
        _ = sigint.recv() => {
            info!("Received SIGINT (Ctrl+C) - initiating graceful shutdown");
            ShutdownSignal::Interrupt
        }
        _ = sighup.recv() => {
            info!("Received SIGHUP - initiating graceful shutdown");
            ShutdownSignal::Hangup
        }
        _ = sigquit.recv() => {
            info!("Received SIGQUIT - initiating graceful shutdown");
            ShutdownSignal::Quit
        }
    }
}

/// Windows-compatible shutdown signal handler (only handles Ctrl+C)
#[cfg(not(unix))]
pub async fn shutdown_signal() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        return std::future::pending().await;
    }
    info!("Received Ctrl+C - initiating graceful shutdown");
    ShutdownSignal::Interrupt
}

/// Broadcasts a shutdown signal to every subscribed job.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// Get a receiver that will be notified when shutdown is triggered
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownSignal> {
        self.sender.subscribe()
    }

    /// Trigger a shutdown with the given signal
    pub fn trigger(&self, signal: ShutdownSignal) {
        if let Err(e) = self.sender.send(signal) {
            warn!("No shutdown listeners registered: {:?}", e);
        }
    }

    /// Wait for an OS signal and broadcast it to all subscribers
    pub async fn wait_for_signal(&self) {
        let signal = shutdown_signal().await;
        self.trigger(signal);
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_shutdown_signal_display() {
        assert_eq!(format!("{}", ShutdownSignal::Interrupt), "SIGINT (Ctrl+C)");
        assert_eq!(format!("{}", ShutdownSignal::Terminate), "SIGTERM");
        assert_eq!(format!("{}", ShutdownSignal::Hangup), "SIGHUP");
        assert_eq!(format!("{}", ShutdownSignal::Quit), "SIGQUIT");
    }

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        let coord = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            coord.trigger(ShutdownSignal::Terminate);
        });

        let signal = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Timeout waiting for signal")
            .expect("Channel closed");

        assert_eq!(signal, ShutdownSignal::Terminate);
    }
}
