use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tokio_util::sync::CancellationToken;

/// Install the drain handler, listening for SIGTERM and SIGINT.
///
/// Returns a `CancellationToken` that is cancelled when either signal is
/// received. Every execution task monitors this token: on cancellation it
/// kills its child's process group, waits for the reaper and returns
/// without publishing a response.
pub fn install_drain_handler() -> std::io::Result<CancellationToken> {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!(signal = "SIGTERM", "terminating due to signal");
            }
            _ = sigint.recv() => {
                tracing::info!(signal = "SIGINT", "terminating due to signal");
            }
        }

        token_clone.cancel();
    });

    Ok(token)
}

/// Readers/writer gate that delays process exit while executions are live.
///
/// Each execution task holds a read guard from just before its child is
/// spawned until its response has been published (or the drain path
/// finished reaping). Shutdown acquires the write half, which blocks until
/// every reader has released.
#[derive(Debug, Clone, Default)]
pub struct InFlightGate {
    lock: Arc<RwLock<()>>,
}

impl InFlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the calling task as in-flight for the guard's lifetime.
    pub async fn register(&self) -> OwnedRwLockReadGuard<()> {
        self.lock.clone().read_owned().await
    }

    /// Block until every in-flight execution has concluded.
    ///
    /// The returned write guard must be held until the process exits: a
    /// late execution task blocked in [`register`](Self::register) stays
    /// blocked and dies with the process instead of spawning a child that
    /// nothing would kill or reap.
    pub async fn drain(&self) -> OwnedRwLockWriteGuard<()> {
        self.lock.clone().write_owned().await
    }
}
