//! # Worker-builder states and the transition table.
//!
//! ```text
//!                 construct (eager)                    construct (latent)
//!                        │                                    │
//!                        ▼                                    ▼
//!   ┌──────────────► ATTACHING                ┌─────────────► LATENT ◄──────────────┐
//!   │                    │ Attached           │                 │ SubstantiationStarted
//!   │ Detached           ▼                    │ Detached        ▼                    │ SubstantiationFailed
//!   │ (eager)          IDLE ◄─── Substantiated ─────────── SUBSTANTIATING ───────────┘
//!   │                  │  ▲
//!   │     BuildStarted │  │ BuildFinished
//!   │                  ▼  │
//!   └───────────────  BUILDING
//!
//!   IDLE / LATENT / BUILDING ── PingStarted ──► PINGING ── PingFinished(prior) ──► prior
//! ```
//!
//! Every edge not drawn above is rejected with [`WorkerError::InvalidTransition`].

use std::fmt;

use crate::error::WorkerError;

/// State of one worker as seen by one builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Waiting for the worker to connect.
    Attaching,
    /// Connected and ready for a build.
    Idle,
    /// A liveness ping is outstanding.
    Pinging,
    /// Running a build.
    Building,
    /// On-demand instance is not running.
    Latent,
    /// On-demand instance is booting.
    Substantiating,
}

impl WorkerState {
    /// True unless the worker could take a build right now (IDLE or LATENT).
    #[inline]
    pub fn is_busy(self) -> bool {
        !matches!(self, WorkerState::Idle | WorkerState::Latent)
    }

    /// Upper-case name, as reported in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Attaching => "ATTACHING",
            WorkerState::Idle => "IDLE",
            WorkerState::Pinging => "PINGING",
            WorkerState::Building => "BUILDING",
            WorkerState::Latent => "LATENT",
            WorkerState::Substantiating => "SUBSTANTIATING",
        }
    }

    /// Applies `transition` to this state.
    ///
    /// `latent` selects where `Detached` lands (LATENT instead of ATTACHING).
    pub fn apply(self, transition: Transition, latent: bool) -> Result<WorkerState, WorkerError> {
        use Transition as T;
        use WorkerState as S;

        let to = match (self, transition) {
            (S::Attaching, T::Attached) => Some(S::Idle),
            (S::Idle, T::BuildStarted) => Some(S::Building),
            (S::Building, T::BuildFinished) => Some(S::Idle),
            (S::Idle | S::Latent | S::Building, T::PingStarted) => Some(S::Pinging),
            (S::Pinging, T::PingFinished(prior))
                if matches!(prior, S::Idle | S::Latent | S::Building) =>
            {
                Some(prior)
            }
            (S::Latent, T::SubstantiationStarted) => Some(S::Substantiating),
            (S::Substantiating, T::Substantiated) => Some(S::Idle),
            (S::Substantiating, T::SubstantiationFailed) => Some(S::Latent),
            (S::Attaching, T::Detached) if !latent => None,
            (S::Latent, T::Detached) if latent => None,
            (_, T::Detached) if latent => Some(S::Latent),
            (_, T::Detached) => Some(S::Attaching),
            _ => None,
        };

        to.ok_or(WorkerError::InvalidTransition {
            from: self,
            transition,
        })
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event driving a [`WorkerState`] change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Attach handshake completed.
    Attached,
    /// A build was assigned.
    BuildStarted,
    /// The assigned build finished.
    BuildFinished,
    /// A liveness ping was sent.
    PingStarted,
    /// The ping completed (or was aborted); carries the state to restore.
    PingFinished(WorkerState),
    /// Latent instance boot began.
    SubstantiationStarted,
    /// Latent instance is up.
    Substantiated,
    /// Latent instance boot failed or was cancelled.
    SubstantiationFailed,
    /// Connection went away.
    Detached,
}
