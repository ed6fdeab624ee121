//! # MultiServiceLoop: a loop that is also a service container.
//!
//! Each child is a [`Service`] and, by the same token, a processor of the
//! loop. The container's own lifecycle gates scheduling:
//!
//! ```text
//! (new) ──► start() ──► children start in order ──► rounds enabled
//!                                                        │
//! stop() ◄───────────────────────────────────────────────┘
//!   ├─► rounds disabled, pending requests dropped
//!   ├─► in-flight round allowed to finish
//!   └─► children stop in reverse order
//! ```
//!
//! Triggers received before `start()` are remembered and run once started.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::config::Config;
use crate::error::ServiceError;
use crate::events::{Bus, Event, EventKind};

use super::base::Loop;
use super::clock::{ClockRef, TokioClock};
use super::engine::Trigger;
use super::processor::{Processor, ProcessorRef};

/// A child of a [`MultiServiceLoop`]: processor plus lifecycle hooks.
#[async_trait]
pub trait Service: Processor {
    /// Called when the container starts (or on add, if already running).
    async fn start_service(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Called when the container stops, after the last round finished.
    async fn stop_service(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Shared handle to a service.
pub type ServiceRef = Arc<dyn Service>;

/// Loop whose processors are its child services.
#[derive(Clone)]
pub struct MultiServiceLoop {
    lp: Loop,
    children: Arc<Mutex<Vec<ServiceRef>>>,
    running: Arc<AtomicBool>,
}

impl MultiServiceLoop {
    /// Creates a stopped container driven by the tokio clock.
    pub fn new(name: impl Into<Arc<str>>, cfg: &Config, bus: Bus) -> Self {
        Self::with_clock(name, cfg, bus, Arc::new(TokioClock))
    }

    /// Creates a stopped container with an injected clock.
    pub fn with_clock(name: impl Into<Arc<str>>, cfg: &Config, bus: Bus, clock: ClockRef) -> Self {
        Self {
            lp: Loop::build(name.into(), cfg, bus, clock, false),
            children: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Container name.
    pub fn name(&self) -> &str {
        self.lp.name()
    }

    /// True between a successful `start()` and the next `stop()`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Adds a child; it is started right away if the container is running,
    /// and becomes a processor of every subsequent round.
    pub async fn add_child<S: Service>(&self, child: Arc<S>) -> Result<(), ServiceError> {
        if self.is_running() {
            child.start_service().await?;
        }
        let processor: ProcessorRef = child.clone();
        let service: ServiceRef = child;
        self.lp.add(processor);
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(service);
        Ok(())
    }

    /// Starts children in insertion order, then enables rounds.
    ///
    /// If a child fails to start, the ones already started are stopped again
    /// and the container stays stopped.
    pub async fn start(&self) -> Result<(), ServiceError> {
        if self.is_running() {
            return Ok(());
        }
        let children = self.snapshot();
        for (idx, child) in children.iter().enumerate() {
            if let Err(e) = child.start_service().await {
                for started in children[..idx].iter().rev() {
                    let _ = started.stop_service().await;
                }
                return Err(e);
            }
        }

        self.running.store(true, Ordering::SeqCst);
        self.lp
            .bus()
            .publish(Event::new(EventKind::ServiceStarted).with_subject(self.name()));
        self.lp.engine().enable();
        Ok(())
    }

    /// Disables rounds, waits for an in-flight round, then stops children in
    /// reverse order. Returns the first child error, after stopping them all.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.lp.engine().disable();
        self.lp.when_quiet().await;

        let mut first_err = None;
        for child in self.snapshot().iter().rev() {
            if let Err(e) = child.stop_service().await {
                first_err.get_or_insert(e);
            }
        }
        self.lp
            .bus()
            .publish(Event::new(EventKind::ServiceStopped).with_subject(self.name()));
        first_err.map_or(Ok(()), Err)
    }

    /// Requests a round (deferred until `start()` if stopped).
    pub fn trigger(&self) {
        self.lp.trigger();
    }

    /// Non-owning handle for collaborators that need to request rounds.
    pub fn trigger_handle(&self) -> Trigger {
        self.lp.trigger_handle()
    }

    /// Resolves the next time the loop has no round running and none pending.
    pub fn when_quiet(&self) -> impl Future<Output = ()> + Send + 'static {
        self.lp.when_quiet()
    }

    /// True when no round is running and none is pending.
    pub fn is_quiet(&self) -> bool {
        self.lp.is_quiet()
    }

    fn snapshot(&self) -> Vec<ServiceRef> {
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::error::ProcessorError;
    use crate::processing::Wake;

    struct Child {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        work: Duration,
        rounds: AtomicUsize,
        refuse_start: bool,
    }

    impl Child {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                log: log.clone(),
                work: Duration::ZERO,
                rounds: AtomicUsize::new(0),
                refuse_start: false,
            }
        }

        fn record(&self, what: &str) {
            self.log.lock().unwrap().push(format!("{}:{what}", self.name));
        }
    }

    #[async_trait]
    impl Processor for Child {
        fn name(&self) -> &str {
            self.name
        }

        async fn process(&self) -> Result<Wake, ProcessorError> {
            self.record("enter");
            tokio::time::sleep(self.work).await;
            self.rounds.fetch_add(1, Ordering::SeqCst);
            self.record("exit");
            Ok(None)
        }
    }

    #[async_trait]
    impl Service for Child {
        async fn start_service(&self) -> Result<(), ServiceError> {
            if self.refuse_start {
                return Err(ServiceError::Start {
                    name: self.name.to_string(),
                    error: "refused".into(),
                });
            }
            self.record("start");
            Ok(())
        }

        async fn stop_service(&self) -> Result<(), ServiceError> {
            self.record("stop");
            Ok(())
        }
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn no_rounds_before_start() {
        let log = log();
        let msl = MultiServiceLoop::new("svc", &Config::default(), Bus::new(64));
        let a = Arc::new(Child::new("a", &log));
        msl.add_child(a.clone()).await.unwrap();

        msl.trigger();
        tokio::task::yield_now().await;
        assert_eq!(a.rounds.load(Ordering::SeqCst), 0);
        assert!(!msl.is_quiet(), "request is remembered until start");

        msl.start().await.unwrap();
        msl.when_quiet().await;
        assert_eq!(a.rounds.load(Ordering::SeqCst), 1);
        assert_eq!(*log.lock().unwrap(), vec!["a:start", "a:enter", "a:exit"]);
    }

    #[tokio::test]
    async fn children_start_in_order_and_stop_in_reverse() {
        let log = log();
        let msl = MultiServiceLoop::new("svc", &Config::default(), Bus::new(64));
        msl.add_child(Arc::new(Child::new("a", &log))).await.unwrap();
        msl.add_child(Arc::new(Child::new("b", &log))).await.unwrap();

        msl.start().await.unwrap();
        msl.add_child(Arc::new(Child::new("c", &log))).await.unwrap();
        msl.stop().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:start", "b:start", "c:start", "c:stop", "b:stop", "a:stop"]
        );
        assert!(!msl.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_lets_in_flight_round_finish_and_blocks_new_ones() {
        let log = log();
        let msl = MultiServiceLoop::new("svc", &Config::default(), Bus::new(64));
        let mut slow = Child::new("slow", &log);
        slow.work = Duration::from_millis(50);
        let slow = Arc::new(slow);
        msl.add_child(slow.clone()).await.unwrap();
        msl.start().await.unwrap();

        msl.trigger();
        tokio::task::yield_now().await;
        msl.stop().await.unwrap();

        assert_eq!(slow.rounds.load(Ordering::SeqCst), 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["slow:start", "slow:enter", "slow:exit", "slow:stop"]
        );

        msl.trigger();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(slow.rounds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_child_start_rolls_back() {
        let log = log();
        let msl = MultiServiceLoop::new("svc", &Config::default(), Bus::new(64));
        msl.add_child(Arc::new(Child::new("a", &log))).await.unwrap();
        let mut bad = Child::new("bad", &log);
        bad.refuse_start = true;
        msl.add_child(Arc::new(bad)).await.unwrap();

        let err = msl.start().await.unwrap_err();
        assert_eq!(err.as_label(), "service_start_failed");
        assert!(!msl.is_running());
        assert_eq!(*log.lock().unwrap(), vec!["a:start", "a:stop"]);
    }
}
