//! Build result codes and the forced-stop classification.

use std::fmt;

/// Outcome of a build, as understood by the reporting side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildResult {
    /// Build passed.
    Success,
    /// Build passed with warnings.
    Warnings,
    /// Build failed.
    Failure,
    /// Build was skipped.
    Skipped,
    /// Build hit an internal error.
    Exception,
    /// Build did not really run; the request goes back to the queue.
    Retry,
    /// Build was stopped on purpose.
    Cancelled,
}

impl BuildResult {
    /// Upper-case result code.
    pub fn as_str(self) -> &'static str {
        match self {
            BuildResult::Success => "SUCCESS",
            BuildResult::Warnings => "WARNINGS",
            BuildResult::Failure => "FAILURE",
            BuildResult::Skipped => "SKIPPED",
            BuildResult::Exception => "EXCEPTION",
            BuildResult::Retry => "RETRY",
            BuildResult::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result given to a build that is forcibly stopped.
///
/// A build somebody is explicitly waiting on is CANCELLED, so the waiter
/// learns it will not complete; anything else is RETRY and will run again.
#[inline]
pub fn classify_stopped_build(waited_for: bool) -> BuildResult {
    if waited_for {
        BuildResult::Cancelled
    } else {
        BuildResult::Retry
    }
}
