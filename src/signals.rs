//! Process signal routing
//!
//! Interrupt and terminate are turned into [`ShutdownSignal`] values for the
//! supervisor's monitor loop; workers never see OS signals directly, they
//! watch the shutdown token the supervisor cancels. Broken pipes are ignored
//! for the whole process.

use std::fmt;
use std::io;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

#[cfg(unix)]
pub struct SignalRouter {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalRouter {
    /// Register handlers; must be called from inside the tokio runtime
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        ignore_broken_pipe();

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for the next shutdown signal
    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            Some(()) = self.interrupt.recv() => ShutdownSignal::Interrupt,
            Some(()) = self.terminate.recv() => ShutdownSignal::Terminate,
            else => std::future::pending().await,
        }
    }
}

#[cfg(unix)]
fn ignore_broken_pipe() {
    // SAFETY: installing SIG_IGN has no handler code to race with
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
pub struct SignalRouter;

#[cfg(not(unix))]
impl SignalRouter {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> ShutdownSignal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ShutdownSignal::Interrupt,
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
                std::future::pending().await
            }
        }
    }
}

impl SignalRouter {
    /// Push every received signal into `tx` until the receiver is gone
    pub async fn forward(mut self, tx: mpsc::Sender<ShutdownSignal>) {
        loop {
            let signal = self.recv().await;
            if tx.send(signal).await.is_err() {
                break;
            }
        }
    }
}
