// src/server/shutdown.rs

//! Turns process termination signals into a stop request for the listener.

use super::listener::StopHandle;
use std::io;
use tokio::task::JoinHandle;
use tracing::info;

/// Registers the signal handlers and spawns a task that stops the listener on the
/// first signal received.
///
/// Registration happens before this returns, so a registration failure is reported
/// to the caller instead of leaving the server unstoppable.
pub fn install(stop: StopHandle) -> io::Result<JoinHandle<()>> {
    let signals = Signals::register()?;
    Ok(tokio::spawn(async move {
        let name = signals.recv().await;
        info!("{} received, initiating shutdown.", name);
        stop.stop();
    }))
}

#[cfg(unix)]
struct Signals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "Ctrl-C",
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending().await
            }
        }
    }
}
