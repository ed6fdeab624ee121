//! # Round engine shared by every loop flavour.
//!
//! The engine owns the scheduling state; loops differ only in where the
//! processors of a round come from ([`ProcessorSource`]).
//!
//! ## State
//! ```text
//! enabled  ── may rounds run at all (service gating)
//! active   ── a driver task is running a cascade of rounds
//! pending  ── a round was requested and has not started yet
//! timer    ── deferred wake-up (at most one)
//! waiters  ── when_quiet() completions, in registration order
//! ```
//!
//! ## Driver
//! ```text
//! trigger() ─► pending = true ─► (not active && enabled) ─► active = true, spawn driver
//!
//! driver:
//!   loop {
//!     ├─► lock: !pending || !enabled ─► settle (below), exit
//!     ├─► pending = false, cancel timer
//!     ├─► processors = source.processors()
//!     └─► for p in processors (strictly one at a time):
//!            outcome = catch_unwind(p.process()).await
//!            Ok(Some(at)) ─► remember earliest wake
//!            Err / panic  ─► publish ProcessorFailed, continue
//!   }
//!
//! settle:
//!   active = false
//!   last round asked for a wake ─► timer at max(ocd_minimum_delay, at - now)
//!   publish LoopQuiet, resolve every waiter
//! ```
//!
//! ## Rules
//! - Only one driver per engine; re-entrant `trigger()` calls only set `pending`.
//! - Any number of `trigger()` calls before a round starts yield exactly one round.
//! - Processors of a round never overlap (single-file).
//! - A processor that never completes stalls the engine; there is no loop-level timeout.

use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessorError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::panic_message;

use super::clock::ClockRef;
use super::processor::{ProcessorRef, Wake};

/// Where the processors of a round come from.
pub(crate) trait ProcessorSource: Send + Sync + 'static {
    /// Processors for the round about to start.
    fn processors(&self) -> Vec<ProcessorRef>;
}

#[derive(Default)]
struct State {
    enabled: bool,
    active: bool,
    pending: bool,
    timer: Option<CancellationToken>,
    quiet_waiters: Vec<oneshot::Sender<()>>,
}

pub(crate) struct Engine {
    name: Arc<str>,
    source: Arc<dyn ProcessorSource>,
    clock: ClockRef,
    bus: Bus,
    min_delay: Duration,
    state: Mutex<State>,
}

impl Engine {
    pub(crate) fn new(
        name: Arc<str>,
        source: Arc<dyn ProcessorSource>,
        clock: ClockRef,
        bus: Bus,
        min_delay: Duration,
        enabled: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            source,
            clock,
            bus,
            min_delay,
            state: Mutex::new(State {
                enabled,
                ..State::default()
            }),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Requests a round; merged with every other request made before it starts.
    pub(crate) fn trigger(self: &Arc<Self>) {
        let mut st = self.lock();
        st.pending = true;
        if st.active || !st.enabled {
            return;
        }
        st.active = true;
        drop(st);
        self.spawn_driver();
    }

    /// True when no round is running and none is pending.
    pub(crate) fn is_quiet(&self) -> bool {
        let st = self.lock();
        !st.active && !st.pending
    }

    /// Registers a completion for the next quiescence.
    ///
    /// Registration happens at call time; if the engine is already quiet the
    /// returned future is ready on first poll. A disabled engine holding a
    /// request counts as quiet: nothing runs until it is enabled again.
    pub(crate) fn when_quiet(&self) -> impl Future<Output = ()> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        {
            let mut st = self.lock();
            if st.active || (st.pending && st.enabled) {
                st.quiet_waiters.push(tx);
            } else {
                let _ = tx.send(());
            }
        }
        async move {
            let _ = rx.await;
        }
    }

    /// Allows rounds to run; starts one if a trigger arrived while disabled.
    pub(crate) fn enable(self: &Arc<Self>) {
        let mut st = self.lock();
        st.enabled = true;
        if st.pending && !st.active {
            st.active = true;
            drop(st);
            self.spawn_driver();
        }
    }

    /// Forbids new rounds and drops pending requests and wake-ups.
    ///
    /// An in-flight round is allowed to finish; await [`Engine::when_quiet`] for it.
    pub(crate) fn disable(&self) {
        let mut st = self.lock();
        st.enabled = false;
        st.pending = false;
        if let Some(timer) = st.timer.take() {
            timer.cancel();
        }
        if st.active {
            return;
        }
        let waiters = mem::take(&mut st.quiet_waiters);
        drop(st);
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    fn spawn_driver(self: &Arc<Self>) {
        let me = Arc::clone(self);
        tokio::spawn(async move { me.drive().await });
    }

    async fn drive(self: Arc<Self>) {
        let mut round: u32 = 0;
        let mut wake: Wake = None;
        loop {
            {
                let mut st = self.lock();
                if !st.pending || !st.enabled {
                    self.settle(st, wake);
                    return;
                }
                st.pending = false;
                if let Some(timer) = st.timer.take() {
                    timer.cancel();
                }
            }

            round = round.saturating_add(1);
            let processors = self.source.processors();
            self.bus.publish(
                Event::new(EventKind::RoundStarted)
                    .with_subject(Arc::clone(&self.name))
                    .with_attempt(round),
            );
            wake = self.run_round(&processors).await;
            self.bus.publish(
                Event::new(EventKind::RoundFinished)
                    .with_subject(Arc::clone(&self.name))
                    .with_attempt(round),
            );
        }
    }

    /// Runs every processor of one round, strictly one after the other.
    async fn run_round(&self, processors: &[ProcessorRef]) -> Wake {
        let mut wake: Wake = None;
        for p in processors {
            let outcome = std::panic::AssertUnwindSafe(p.process())
                .catch_unwind()
                .await;
            let res = outcome.unwrap_or_else(|panic| {
                Err(ProcessorError::Panicked {
                    info: panic_message(panic.as_ref()),
                })
            });
            match res {
                Ok(Some(at)) => wake = Some(wake.map_or(at, |cur| cur.min(at))),
                Ok(None) => {}
                Err(e) => self.bus.publish(
                    Event::new(EventKind::ProcessorFailed)
                        .with_subject(p.name())
                        .with_reason(e.to_string()),
                ),
            }
        }
        wake
    }

    /// Goes quiet: arms the wake-up timer and resolves waiters.
    fn settle(self: &Arc<Self>, mut st: MutexGuard<'_, State>, wake: Wake) {
        st.active = false;
        if st.enabled {
            if let Some(at) = wake {
                self.schedule_wake(&mut st, at);
            }
        }
        let waiters = mem::take(&mut st.quiet_waiters);
        drop(st);

        self.bus
            .publish(Event::new(EventKind::LoopQuiet).with_subject(Arc::clone(&self.name)));
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    fn schedule_wake(self: &Arc<Self>, st: &mut State, at: Instant) {
        let now = self.clock.now();
        let delay = at.saturating_duration_since(now).max(self.min_delay);
        let deadline = now + delay;

        let token = CancellationToken::new();
        if let Some(old) = st.timer.replace(token.clone()) {
            old.cancel();
        }

        let engine = Arc::downgrade(self);
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = clock.sleep_until(deadline) => {
                    if let Some(engine) = engine.upgrade() {
                        engine.fire_wake(&token);
                    }
                }
            }
        });

        self.bus.publish(
            Event::new(EventKind::WakeScheduled)
                .with_subject(Arc::clone(&self.name))
                .with_delay(delay),
        );
    }

    fn fire_wake(self: &Arc<Self>, token: &CancellationToken) {
        {
            let mut st = self.lock();
            if token.is_cancelled() {
                return;
            }
            st.timer = None;
        }
        self.trigger();
    }
}

/// Non-owning handle that can request rounds of a loop.
///
/// Collaborators (builders, timers, connection handlers) keep a `Trigger`
/// instead of the loop itself so that they never keep it alive.
#[derive(Clone)]
pub struct Trigger {
    engine: Weak<Engine>,
}

impl Trigger {
    pub(crate) fn new(engine: &Arc<Engine>) -> Self {
        Self {
            engine: Arc::downgrade(engine),
        }
    }

    /// A handle that is not bound to any loop; triggering it does nothing.
    pub fn detached() -> Self {
        Self {
            engine: Weak::new(),
        }
    }

    /// Requests a round. Returns `false` if the loop no longer exists.
    pub fn trigger(&self) -> bool {
        match self.engine.upgrade() {
            Some(engine) => {
                engine.trigger();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("alive", &(self.engine.strong_count() > 0))
            .finish()
    }
}
