//! Waits for the process to be asked to stop.
//!
//! Unix: SIGINT, SIGTERM, SIGQUIT, or Ctrl-C. Elsewhere only Ctrl-C.

use tracing::info;

use super::error::InfraError;

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = tokio::signal::ctrl_c() => "ctrl-c",
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Completes once a termination signal arrives.
pub async fn shutdown_signal() -> Result<(), InfraError> {
    let signal = wait_for_signal().await?;
    info!(
        target = "infra::shutdown",
        signal, "shutdown signal received"
    );
    Ok(())
}
