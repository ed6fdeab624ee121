//! # DelegateLoop: loop whose processor set is recomputed every round.
//!
//! Instead of a stored list, a [`DelegateLoop`] calls a caller-supplied
//! accessor at the start of each round. Useful when the set of things to
//! process grows and shrinks on its own (active builders, attached workers).
//!
//! The accessor runs on the driver task without any loop lock held, so it
//! may call back into the loop (e.g. `trigger()`).

use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::events::Bus;

use super::clock::{ClockRef, TokioClock};
use super::engine::{Engine, ProcessorSource, Trigger};
use super::processor::ProcessorRef;

struct Delegated<F> {
    get_processors: F,
}

impl<F> ProcessorSource for Delegated<F>
where
    F: Fn() -> Vec<ProcessorRef> + Send + Sync + 'static,
{
    fn processors(&self) -> Vec<ProcessorRef> {
        (self.get_processors)()
    }
}

/// Scheduler over a dynamically computed processor set.
#[derive(Clone)]
pub struct DelegateLoop {
    engine: Arc<Engine>,
}

impl DelegateLoop {
    /// Creates a loop driven by the tokio clock.
    pub fn new<F>(name: impl Into<Arc<str>>, cfg: &Config, bus: Bus, get_processors: F) -> Self
    where
        F: Fn() -> Vec<ProcessorRef> + Send + Sync + 'static,
    {
        Self::with_clock(name, cfg, bus, Arc::new(TokioClock), get_processors)
    }

    /// Creates a loop with an injected clock.
    pub fn with_clock<F>(
        name: impl Into<Arc<str>>,
        cfg: &Config,
        bus: Bus,
        clock: ClockRef,
        get_processors: F,
    ) -> Self
    where
        F: Fn() -> Vec<ProcessorRef> + Send + Sync + 'static,
    {
        let engine = Engine::new(
            name.into(),
            Arc::new(Delegated { get_processors }),
            clock,
            bus,
            cfg.ocd_minimum_delay,
            true,
        );
        Self { engine }
    }

    /// Loop name (used as event subject).
    pub fn name(&self) -> &str {
        self.engine.name()
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

    /// Lets rounds run again after [`DelegateLoop::stop`].
    pub fn start(&self) {
        self.engine.enable();
    }

    /// Stops scheduling: drops pending requests, lets an in-flight round finish
    /// and resolves once it has.
    pub async fn stop(&self) {
        self.engine.disable();
        self.engine.when_quiet().await;
    }
}
