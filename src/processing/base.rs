//! # Loop: trigger-coalescing scheduler over a registered processor set.
//!
//! [`Loop`] keeps an ordered list of processors (insertion order) and runs all
//! of them once per round. Rounds are requested with [`Loop::trigger`]; any
//! number of requests made before a round starts are merged into one.
//!
//! ## Example
//! ```rust
//! use buildmaster::{Bus, Config, Loop, ProcessorError, ProcessorFn};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let lp = Loop::new("housekeeping", &Config::default(), Bus::new(64));
//! lp.add(ProcessorFn::arc("expire-locks", || async { Ok::<_, ProcessorError>(None) }));
//!
//! lp.trigger();
//! lp.trigger(); // merged with the first request
//! lp.when_quiet().await;
//! assert!(lp.is_quiet());
//! # }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::events::Bus;

use super::clock::{ClockRef, TokioClock};
use super::engine::{Engine, ProcessorSource, Trigger};
use super::processor::ProcessorRef;

/// Insertion-ordered processor list.
#[derive(Default)]
struct Registered {
    list: Mutex<Vec<ProcessorRef>>,
}

impl ProcessorSource for Registered {
    fn processors(&self) -> Vec<ProcessorRef> {
        self.list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Scheduler over a static, explicitly registered set of processors.
///
/// Cloning a `Loop` yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Loop {
    engine: Arc<Engine>,
    registered: Arc<Registered>,
}

impl Loop {
    /// Creates an empty loop driven by the tokio clock.
    pub fn new(name: impl Into<Arc<str>>, cfg: &Config, bus: Bus) -> Self {
        Self::with_clock(name, cfg, bus, Arc::new(TokioClock))
    }

    /// Creates an empty loop with an injected clock.
    pub fn with_clock(name: impl Into<Arc<str>>, cfg: &Config, bus: Bus, clock: ClockRef) -> Self {
        Self::build(name.into(), cfg, bus, clock, true)
    }

    pub(crate) fn build(
        name: Arc<str>,
        cfg: &Config,
        bus: Bus,
        clock: ClockRef,
        enabled: bool,
    ) -> Self {
        let registered = Arc::new(Registered::default());
        let engine = Engine::new(
            name,
            registered.clone(),
            clock,
            bus,
            cfg.ocd_minimum_delay,
            enabled,
        );
        Self { engine, registered }
    }

    pub(crate) fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Loop name (used as event subject).
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// Event bus this loop publishes on.
    pub fn bus(&self) -> &Bus {
        self.engine.bus()
    }

    /// Registers a processor; it runs on every subsequent round.
    pub fn add(&self, processor: ProcessorRef) {
        self.registered
            .list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(processor);
    }

    /// Unregisters the first processor with the given name.
    ///
    /// A round already in progress keeps its own snapshot of the list.
    pub fn remove(&self, name: &str) -> bool {
        let mut list = self
            .registered
            .list
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match list.iter().position(|p| p.name() == name) {
            Some(idx) => {
                list.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Number of registered processors.
    pub fn len(&self) -> usize {
        self.registered
            .list
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if no processor is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests a round as soon as the current one (if any) is over.
    pub fn trigger(&self) {
        self.engine.trigger();
    }

    /// Non-owning handle for collaborators that need to request rounds.
    pub fn trigger_handle(&self) -> Trigger {
        Trigger::new(&self.engine)
    }

    /// Resolves the next time the loop has no round running and none pending.
    pub fn when_quiet(&self) -> impl Future<Output = ()> + Send + 'static {
        self.engine.when_quiet()
    }

    /// True when no round is running and none is pending.
    pub fn is_quiet(&self) -> bool {
        self.engine.is_quiet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::broadcast;
    use tokio::time::Instant;

    use crate::error::ProcessorError;
    use crate::events::EventKind;
    use crate::processing::{Processor, ProcessorFn};
    use crate::processing::testing::{CountingProcessor, SingleFileChecker};

    fn count_kind(rx: &mut broadcast::Receiver<crate::Event>, kind: EventKind) -> usize {
        let mut n = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == kind {
                n += 1;
            }
        }
        n
    }

    fn with_floor(floor: Duration) -> Config {
        Config {
            ocd_minimum_delay: floor,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn retrigger_during_round_runs_a_second_full_round() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &Config::default(), Bus::new(256));
        let mut rx = lp.bus().subscribe();

        let procs: Vec<Arc<CountingProcessor>> = (0..4)
            .map(|i| {
                let p = CountingProcessor::new(&format!("p{i}"), &checker);
                (if i == 1 { p.retrigger_on(1) } else { p }).arc()
            })
            .collect();
        procs[1].trigger.set(lp.trigger_handle()).unwrap();
        for p in &procs {
            lp.add(p.clone());
        }

        lp.trigger();
        lp.when_quiet().await;

        for p in &procs {
            assert_eq!(p.count(), 2, "{} should run in both rounds", p.name());
        }
        assert_eq!(checker.violations(), 0);
        assert!(lp.is_quiet());
        // One quiescence for the whole cascade.
        assert_eq!(count_kind(&mut rx, EventKind::LoopQuiet), 1);
    }

    #[tokio::test]
    async fn triggers_before_round_start_are_merged() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &Config::default(), Bus::new(256));
        let mut rx = lp.bus().subscribe();
        let a = CountingProcessor::new("a", &checker).arc();
        let b = CountingProcessor::new("b", &checker).arc();
        lp.add(a.clone());
        lp.add(b.clone());

        lp.trigger();
        lp.trigger();
        lp.trigger();
        lp.when_quiet().await;

        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 1);
        assert_eq!(count_kind(&mut rx, EventKind::RoundStarted), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn processors_never_overlap_within_a_round() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &Config::default(), Bus::new(256));
        let procs: Vec<Arc<CountingProcessor>> = (0..3)
            .map(|i| {
                CountingProcessor::new(&format!("slow{i}"), &checker)
                    .working(Duration::from_millis(10 * (3 - i as u64)))
                    .arc()
            })
            .collect();
        for p in &procs {
            lp.add(p.clone());
        }

        lp.trigger();
        lp.when_quiet().await;

        assert_eq!(checker.violations(), 0);
        // slow0 takes 30ms, slow1 20ms: each starts after the previous one exited.
        let t0 = procs[0].started_at()[0];
        let t1 = procs[1].started_at()[0];
        let t2 = procs[2].started_at()[0];
        assert!(t1 >= t0 + Duration::from_millis(30));
        assert!(t2 >= t1 + Duration::from_millis(20));
    }

    #[tokio::test]
    async fn when_quiet_on_idle_loop_resolves_without_waiting_for_a_round() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &Config::default(), Bus::new(64));
        let p = CountingProcessor::new("p", &checker).arc();
        lp.add(p.clone());

        let already_quiet = lp.when_quiet();
        lp.trigger();
        already_quiet.await;
        assert_eq!(p.count(), 0, "registered while quiet, so it must not wait");

        lp.when_quiet().await;
        assert_eq!(p.count(), 1);
    }

    #[tokio::test]
    async fn waiters_registered_during_a_round_resolve_after_the_cascade() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &Config::default(), Bus::new(64));
        let p = CountingProcessor::new("p", &checker).retrigger_on(1).arc();
        p.trigger.set(lp.trigger_handle()).unwrap();
        lp.add(p.clone());

        lp.trigger();
        let first = lp.when_quiet();
        let second = lp.when_quiet();
        first.await;
        second.await;
        assert_eq!(p.count(), 2);
    }

    #[tokio::test]
    async fn failing_processor_does_not_stop_the_round() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &Config::default(), Bus::new(256));
        let mut rx = lp.bus().subscribe();
        let a = CountingProcessor::new("a", &checker).arc();
        let bad = CountingProcessor::new("bad", &checker).failing_on(1).arc();
        let c = CountingProcessor::new("c", &checker).arc();
        lp.add(a.clone());
        lp.add(bad.clone());
        lp.add(c.clone());

        lp.trigger();
        lp.when_quiet().await;
        assert_eq!((a.count(), bad.count(), c.count()), (1, 1, 1));
        assert_eq!(checker.violations(), 0);

        let mut failed = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ProcessorFailed {
                failed.push(ev.subject.as_deref().unwrap_or_default().to_string());
            }
        }
        assert_eq!(failed, vec!["bad".to_string()]);

        // No automatic retry, but the next trigger runs normally.
        lp.trigger();
        lp.when_quiet().await;
        assert_eq!((a.count(), bad.count(), c.count()), (2, 2, 2));
    }

    #[tokio::test]
    async fn panicking_processor_is_reported_and_isolated() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &Config::default(), Bus::new(256));
        let mut rx = lp.bus().subscribe();
        lp.add(ProcessorFn::arc("explodes", || async {
            if true {
                panic!("kaboom");
            }
            Ok::<_, ProcessorError>(None)
        }));
        let after = CountingProcessor::new("after", &checker).arc();
        lp.add(after.clone());

        lp.trigger();
        lp.when_quiet().await;

        assert_eq!(after.count(), 1);
        let failure = std::iter::from_fn(|| rx.try_recv().ok())
            .find(|ev| ev.kind == EventKind::ProcessorFailed)
            .expect("failure event");
        assert_eq!(failure.subject.as_deref(), Some("explodes"));
        assert!(failure.reason.as_deref().unwrap_or_default().contains("kaboom"));
    }

    #[tokio::test(start_paused = true)]
    async fn wake_request_is_floored_to_minimum_delay() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &with_floor(Duration::from_secs(1)), Bus::new(256));

        let delayed = CountingProcessor::new("delayed", &checker)
            .requesting_wakes(2, Duration::from_millis(10))
            .arc();
        let immediates: Vec<Arc<CountingProcessor>> = (0..3)
            .map(|i| {
                let p = CountingProcessor::new(&format!("now{i}"), &checker);
                (if i == 0 { p.retrigger_on(1) } else { p }).arc()
            })
            .collect();
        immediates[0].trigger.set(lp.trigger_handle()).unwrap();
        lp.add(delayed.clone());
        for p in &immediates {
            lp.add(p.clone());
        }

        lp.trigger();
        lp.when_quiet().await;
        let quiet_at = Instant::now();
        assert_eq!(delayed.count(), 2);
        assert!(immediates.iter().all(|p| p.count() == 2));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(delayed.count(), 2, "woke before the floor");

        tokio::time::sleep(Duration::from_secs(2)).await;
        lp.when_quiet().await;
        assert_eq!(delayed.count(), 3);
        // The wake round runs every processor, not only the one that asked.
        assert!(immediates.iter().all(|p| p.count() == 3));
        assert!(delayed.started_at()[2] >= quiet_at + Duration::from_secs(1));
        assert_eq!(checker.violations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wake_request_beyond_floor_is_honoured() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &with_floor(Duration::from_secs(1)), Bus::new(256));
        let p = CountingProcessor::new("p", &checker)
            .requesting_wakes(1, Duration::from_secs(5))
            .arc();
        lp.add(p.clone());

        lp.trigger();
        lp.when_quiet().await;
        let quiet_at = Instant::now();

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(p.count(), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        lp.when_quiet().await;
        assert_eq!(p.count(), 2);
        assert!(p.started_at()[1] >= quiet_at + Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_trigger_supersedes_pending_wake() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &with_floor(Duration::from_millis(100)), Bus::new(256));
        let p = CountingProcessor::new("p", &checker)
            .requesting_wakes(1, Duration::from_secs(10))
            .arc();
        lp.add(p.clone());

        lp.trigger();
        lp.when_quiet().await;
        lp.trigger();
        lp.when_quiet().await;
        assert_eq!(p.count(), 2);

        // The second round asked for nothing, so the 10s timer is gone.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(p.count(), 2);
        assert!(lp.is_quiet());
    }

    #[tokio::test]
    async fn removed_processor_is_skipped() {
        let checker = SingleFileChecker::new();
        let lp = Loop::new("test", &Config::default(), Bus::new(64));
        let a = CountingProcessor::new("a", &checker).arc();
        let b = CountingProcessor::new("b", &checker).arc();
        lp.add(a.clone());
        lp.add(b.clone());
        assert_eq!(lp.len(), 2);

        assert!(lp.remove("a"));
        assert!(!lp.remove("missing"));
        lp.trigger();
        lp.when_quiet().await;
        assert_eq!((a.count(), b.count()), (0, 1));
    }

    #[tokio::test]
    async fn trigger_handle_outliving_loop_is_inert() {
        let lp = Loop::new("test", &Config::default(), Bus::new(8));
        let handle = lp.trigger_handle();
        assert!(handle.trigger());
        lp.when_quiet().await;
        drop(lp);
        assert!(!handle.trigger());
        assert!(!Trigger::detached().trigger());
    }
}
