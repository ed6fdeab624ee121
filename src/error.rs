//! Error types used by the build master core.
//!
//! - [`ProcessorError`]: raised by a loop processor during a round (logged, never propagated).
//! - [`ConnectionError`]: raised by the worker transport.
//! - [`SubstantiationError`]: raised while booting a latent worker.
//! - [`WorkerError`]: raised by the worker-builder state machine to its direct caller.
//! - [`ServiceError`]: raised by service start/stop hooks.
//! - [`RuntimeError`]: raised by the process-level runner.
//!
//! All of them provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::workers::{Transition, WorkerState};

/// # Errors produced by a processor during a round.
///
/// The loop catches these, publishes `EventKind::ProcessorFailed` and moves on
/// to the next processor. They never abort a round.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// Processor failed for this round.
    #[error("processing failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// Processor panicked; the panic was caught by the loop.
    #[error("processor panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl ProcessorError {
    /// Convenience constructor for [`ProcessorError::Failed`].
    pub fn failed(error: impl Into<String>) -> Self {
        ProcessorError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use buildmaster::ProcessorError;
    ///
    /// assert_eq!(ProcessorError::failed("db down").as_label(), "processor_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessorError::Failed { .. } => "processor_failed",
            ProcessorError::Panicked { .. } => "processor_panicked",
        }
    }
}

/// # Errors produced by a worker connection.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection went away while a call was outstanding.
    #[error("connection lost")]
    Lost,

    /// The remote side answered with an error.
    #[error("remote error: {error}")]
    Remote {
        /// Error text reported by the worker.
        error: String,
    },
}

impl ConnectionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionError::Lost => "connection_lost",
            ConnectionError::Remote { .. } => "connection_remote_error",
        }
    }
}

/// # Errors produced while substantiating a latent worker.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubstantiationError {
    /// The driver could not bring the instance up.
    #[error("substantiation failed: {error}")]
    Failed {
        /// Driver-provided error message.
        error: String,
    },

    /// The instance did not come up within the configured limit.
    #[error("substantiation timed out after {timeout:?}")]
    Timeout {
        /// The limit that was exceeded.
        timeout: Duration,
    },

    /// Substantiation was cancelled before the instance came up.
    #[error("substantiation cancelled")]
    Cancelled,
}

impl SubstantiationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubstantiationError::Failed { .. } => "substantiation_failed",
            SubstantiationError::Timeout { .. } => "substantiation_timeout",
            SubstantiationError::Cancelled => "substantiation_cancelled",
        }
    }
}

/// # Errors produced by the worker-builder state machine.
///
/// These are surfaced to the direct caller (usually a [`Builder`](crate::Builder))
/// so that it can fail over to another worker or report the build.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The requested transition is not an edge of the state table.
    #[error("invalid transition {transition:?} from state {from:?}")]
    InvalidTransition {
        /// State the worker-builder was in.
        from: WorkerState,
        /// Transition that was requested.
        transition: Transition,
    },

    /// The operation needs a live connection and there is none.
    #[error("worker {worker} is not attached")]
    NotAttached {
        /// Worker name.
        worker: String,
    },

    /// A latent worker failed to boot.
    #[error(transparent)]
    Substantiation(#[from] SubstantiationError),
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use buildmaster::{SubstantiationError, WorkerError};
    ///
    /// let err = WorkerError::from(SubstantiationError::Cancelled);
    /// assert_eq!(err.as_label(), "substantiation_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::InvalidTransition { .. } => "worker_invalid_transition",
            WorkerError::NotAttached { .. } => "worker_not_attached",
            WorkerError::Substantiation(e) => e.as_label(),
        }
    }
}

/// # Errors produced by service lifecycle hooks.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// A child service refused to start.
    #[error("service {name} failed to start: {error}")]
    Start {
        /// Child service name.
        name: String,
        /// Underlying error message.
        error: String,
    },

    /// A child service failed while stopping.
    #[error("service {name} failed to stop: {error}")]
    Stop {
        /// Child service name.
        name: String,
        /// Underlying error message.
        error: String,
    },
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Start { .. } => "service_start_failed",
            ServiceError::Stop { .. } => "service_stop_failed",
        }
    }
}

/// # Errors produced by the process-level runner.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// OS signal listeners could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            ProcessorError::Panicked { info: "x".into() }.as_label(),
            "processor_panicked"
        );
        assert_eq!(ConnectionError::Lost.as_label(), "connection_lost");
        assert_eq!(
            SubstantiationError::Timeout {
                timeout: Duration::from_secs(1)
            }
            .as_label(),
            "substantiation_timeout"
        );
        assert_eq!(
            WorkerError::NotAttached { worker: "w1".into() }.as_label(),
            "worker_not_attached"
        );
    }

    #[test]
    fn invalid_transition_message_names_both_sides() {
        let err = WorkerError::InvalidTransition {
            from: WorkerState::Latent,
            transition: Transition::BuildFinished,
        };
        let msg = err.to_string();
        assert!(msg.contains("Latent"));
        assert!(msg.contains("BuildFinished"));
    }
}
