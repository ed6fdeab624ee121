//! # Process signals that end a build master.
//!
//! [`wait_for_shutdown_signal`] resolves with the [`ShutdownSignal`] that
//! arrived. [`BotMaster::run_until_signal`] turns it into a clean shutdown:
//!
//! ```text
//! SIGINT / SIGTERM ─► Graceful   (running builds finish, waited-for children start)
//! SIGQUIT          ─► Quick      (running builds stopped and classified)
//! any second signal while draining ─► escalate to Quick
//! ```
//!
//! Off Unix only Ctrl-C is observed, reported as [`ShutdownSignal::Interrupt`].
//!
//! [`BotMaster::run_until_signal`]: super::BotMaster::run_until_signal

use super::botmaster::ShutdownMode;

/// Termination signal received by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// `SIGINT` (Ctrl-C).
    Interrupt,
    /// `SIGTERM`, as sent by service managers.
    Terminate,
    /// `SIGQUIT`.
    Quit,
}

impl ShutdownSignal {
    /// Conventional signal name.
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Quit => "SIGQUIT",
        }
    }

    /// Shutdown mode a first signal of this kind asks for.
    pub fn mode(self) -> ShutdownMode {
        match self {
            ShutdownSignal::Interrupt | ShutdownSignal::Terminate => ShutdownMode::Graceful,
            ShutdownSignal::Quit => ShutdownMode::Quick,
        }
    }
}

/// Waits for the next termination signal.
///
/// Listeners are installed per call, so a second call observes the next one.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let received = tokio::select! {
        _ = interrupt.recv() => ShutdownSignal::Interrupt,
        _ = terminate.recv() => ShutdownSignal::Terminate,
        _ = quit.recv() => ShutdownSignal::Quit,
    };
    Ok(received)
}

/// Waits for the next termination signal.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownSignal::Interrupt)
}
