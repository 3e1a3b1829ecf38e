//! # Interrupts during a supervised run.
//!
//! [`interrupted`] completes when the host process receives a termination
//! signal. The supervisor turns it into an aborted run: the child is killed
//! and the outcome becomes `Failed(Aborted)`.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGHUP`. **Elsewhere:** Ctrl-C.

/// Waits for a termination signal and returns its name.
///
/// Returns `Err` if the listeners cannot be registered.
#[cfg(unix)]
pub(crate) async fn interrupted() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sighup.recv() => Ok("SIGHUP"),
    }
}

/// Waits for a termination signal and returns its name.
#[cfg(not(unix))]
pub(crate) async fn interrupted() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
}
