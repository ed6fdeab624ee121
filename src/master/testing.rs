//! Test fixtures for builder, distributor and shutdown scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::botmaster::Stopper;
use super::build::{BuildRunner, RunningBuild};
use super::results::BuildResult;

/// Runner whose builds block until released, then report `result`.
pub(crate) struct GatedRunner {
    release: CancellationToken,
    result: BuildResult,
    runs: AtomicUsize,
    started: Mutex<Vec<u64>>,
}

impl GatedRunner {
    pub(crate) fn new(result: BuildResult) -> Arc<Self> {
        Arc::new(Self {
            release: CancellationToken::new(),
            result,
            runs: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        })
    }

    /// Lets every current and future build complete.
    pub(crate) fn release(&self) {
        self.release.cancel();
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Request ids of the builds that reached the runner.
    pub(crate) fn started(&self) -> Vec<u64> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildRunner for GatedRunner {
    async fn run_build(&self, build: &RunningBuild) -> BuildResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(build.request().id);
        self.release.cancelled().await;
        self.result
    }
}

/// Stopper counting its invocations.
#[derive(Default)]
pub(crate) struct CountingStopper {
    calls: AtomicUsize,
}

impl CountingStopper {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stopper for CountingStopper {
    async fn stop(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Yields until `cond` holds (bounded, so a broken test fails instead of hanging).
pub(crate) async fn settle(mut cond: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
