//! # Running builds and the seam that executes them.
//!
//! A [`RunningBuild`] exists from the moment a worker is reserved for a
//! request until the build's result is known. The shutdown coordinator uses
//! it to stop builds and to wait for them.
//!
//! ```text
//! reserved ──► (prepare, ping, run) ──► finished(result)
//!     │                 │
//!     └── stop(result) ─┘  first stop wins; the build ends with that result
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::events::{Event, EventKind};
use crate::workers::WorkerForBuilder;

use super::request::BuildRequest;
use super::results::BuildResult;

/// Executes builds. Implemented by the build-step layer.
#[async_trait]
pub trait BuildRunner: Send + Sync + 'static {
    /// Runs `build` to completion and reports its result.
    ///
    /// The future is dropped if the build is stopped.
    async fn run_build(&self, build: &RunningBuild) -> BuildResult;
}

/// Shared handle to a running build.
pub type RunningBuildRef = Arc<RunningBuild>;

/// One build in progress.
pub struct RunningBuild {
    number: u64,
    builder: Arc<str>,
    request: BuildRequest,
    worker: WorkerForBuilder,
    cancel: CancellationToken,
    stopped: Mutex<Option<BuildResult>>,
    done: watch::Sender<Option<BuildResult>>,
}

impl RunningBuild {
    pub(crate) fn new(
        number: u64,
        builder: Arc<str>,
        request: BuildRequest,
        worker: WorkerForBuilder,
    ) -> RunningBuildRef {
        let (done, _rx) = watch::channel(None);
        Arc::new(Self {
            number,
            builder,
            request,
            worker,
            cancel: CancellationToken::new(),
            stopped: Mutex::new(None),
            done,
        })
    }

    /// Build number, unique within its builder.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Name of the builder running it.
    pub fn builder(&self) -> &str {
        &self.builder
    }

    /// The request being built.
    pub fn request(&self) -> &BuildRequest {
        &self.request
    }

    /// The worker it runs on.
    pub fn worker(&self) -> &WorkerForBuilder {
        &self.worker
    }

    /// Forcibly stops the build; it finishes with `result`.
    ///
    /// Returns `false` if it was already stopped or finished.
    pub fn stop(&self, result: BuildResult, reason: &str) -> bool {
        if self.is_finished() {
            return false;
        }
        {
            let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
            if stopped.is_some() {
                return false;
            }
            *stopped = Some(result);
        }
        self.cancel.cancel();
        self.worker.worker().bus().publish(
            Event::new(EventKind::BuildStopped)
                .with_subject(self.worker.worker().name_arc())
                .with_builder(Arc::clone(&self.builder))
                .with_build(self.number)
                .with_result(result)
                .with_reason(reason),
        );
        true
    }

    /// Result requested by [`RunningBuild::stop`], if any.
    pub fn stopped_with(&self) -> Option<BuildResult> {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn finish(&self, result: BuildResult) {
        self.done.send_replace(Some(result));
    }

    /// True once the result is known.
    pub fn is_finished(&self) -> bool {
        self.done.borrow().is_some()
    }

    /// Waits for the build's result.
    pub async fn wait_finished(&self) -> BuildResult {
        let mut rx = self.done.subscribe();
        rx.wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|r| *r)
            .unwrap_or(BuildResult::Exception)
    }
}

impl std::fmt::Debug for RunningBuild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningBuild")
            .field("number", &self.number)
            .field("builder", &self.builder)
            .field("request", &self.request)
            .finish()
    }
}
