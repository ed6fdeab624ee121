//! Test fixtures for loop scenarios.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::ProcessorError;

use super::engine::Trigger;
use super::processor::{Processor, Wake};

/// Records entry/exit markers and counts every overlap.
///
/// Violations are counted rather than asserted: the loop catches processor
/// panics, so an assertion inside a processor would be swallowed.
#[derive(Default)]
pub(crate) struct SingleFileChecker {
    inside: Mutex<Option<String>>,
    violations: AtomicUsize,
}

impl SingleFileChecker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn enter(&self, name: &str) {
        let mut inside = self.inside.lock().unwrap();
        if inside.is_some() {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        *inside = Some(name.to_string());
    }

    pub(crate) fn exit(&self, name: &str) {
        let mut inside = self.inside.lock().unwrap();
        if inside.as_deref() != Some(name) {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        *inside = None;
    }

    pub(crate) fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }
}

/// Processor that counts completions and can re-trigger or request wake-ups.
pub(crate) struct CountingProcessor {
    name: String,
    checker: Arc<SingleFileChecker>,
    /// Time spent "inside" per call (zero = just yield once).
    work: Duration,
    /// Re-trigger the loop on this completion number.
    retrigger_on: Option<usize>,
    /// Request a wake-up `wake_in` from now on the first `wake_requests` calls.
    wake_requests: usize,
    wake_in: Duration,
    /// Fail instead of completing on this call number.
    fail_on: Option<usize>,
    pub(crate) trigger: OnceLock<Trigger>,
    count: AtomicUsize,
    started_at: Mutex<Vec<Instant>>,
}

impl CountingProcessor {
    pub(crate) fn new(name: &str, checker: &Arc<SingleFileChecker>) -> Self {
        Self {
            name: name.to_string(),
            checker: Arc::clone(checker),
            work: Duration::ZERO,
            retrigger_on: None,
            wake_requests: 0,
            wake_in: Duration::ZERO,
            fail_on: None,
            trigger: OnceLock::new(),
            count: AtomicUsize::new(0),
            started_at: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn working(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    pub(crate) fn retrigger_on(mut self, completion: usize) -> Self {
        self.retrigger_on = Some(completion);
        self
    }

    pub(crate) fn requesting_wakes(mut self, times: usize, wake_in: Duration) -> Self {
        self.wake_requests = times;
        self.wake_in = wake_in;
        self
    }

    pub(crate) fn failing_on(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub(crate) fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub(crate) fn started_at(&self) -> Vec<Instant> {
        self.started_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl Processor for CountingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self) -> Result<Wake, ProcessorError> {
        self.checker.enter(&self.name);
        self.started_at.lock().unwrap().push(Instant::now());
        if self.work.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.work).await;
        }
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        self.checker.exit(&self.name);

        if self.fail_on == Some(n) {
            return Err(ProcessorError::failed(format!("{} failed on call {n}", self.name)));
        }
        if self.retrigger_on == Some(n) {
            if let Some(trigger) = self.trigger.get() {
                trigger.trigger();
            }
        }
        if n <= self.wake_requests {
            Ok(Some(Instant::now() + self.wake_in))
        } else {
            Ok(None)
        }
    }
}
