//! # WorkerForBuilder: one worker as seen by one builder.
//!
//! Holds the per-pairing [`WorkerState`], the live connection and the remote
//! command map. All state changes go through [`WorkerState::apply`].
//!
//! ## Ping coalescing
//! ```text
//! ping() ──► in-flight slot occupied? ──yes──► clone its shared result
//!               │ no
//!               ▼
//!     state ─► PINGING (prior remembered)
//!     spawn wire ping: conn.remote_print("ping") [bounded by ping_timeout]
//!     slot = { id, prior, abort handle, shared result }
//!
//! ping done  ─► slot cleared, state ─► prior
//!               failure ─► conn.lose_connection(), PingFailed
//! ```
//!
//! A ping never blocks on the state lock while the wire ping is in flight, and
//! `abort_ping_if_any()` resolves every waiter with `false`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio::task::AbortHandle;

use crate::config::Config;
use crate::error::{SubstantiationError, WorkerError};
use crate::events::{Event, EventKind};

use super::conn::{ConnectionRef, RemoteCommands};
use super::state::{Transition, WorkerState};
use super::worker::{InstanceWatcher, Worker};

const PING_MESSAGE: &str = "ping";

struct InFlightPing {
    id: u64,
    prior: WorkerState,
    abort: AbortHandle,
    result: Shared<BoxFuture<'static, bool>>,
}

struct Slot {
    state: WorkerState,
    conn: Option<ConnectionRef>,
    commands: RemoteCommands,
    ping: Option<InFlightPing>,
    next_ping: u64,
    /// A build was counted against the worker and not yet finished.
    counted: bool,
}

struct Inner {
    builder: Arc<str>,
    worker: Worker,
    ping_limit: Option<Duration>,
    slot: Mutex<Slot>,
}

/// Per-builder-per-worker state machine. Clones share state.
#[derive(Clone)]
pub struct WorkerForBuilder {
    inner: Arc<Inner>,
}

impl WorkerForBuilder {
    /// Pairs `worker` with the builder named `builder`.
    ///
    /// Eager workers start in ATTACHING. Latent workers start in LATENT and
    /// register with the worker right away.
    pub fn new(builder: impl Into<Arc<str>>, worker: &Worker, cfg: &Config) -> Self {
        let state = if worker.is_latent() {
            WorkerState::Latent
        } else {
            WorkerState::Attaching
        };
        let wfb = Self {
            inner: Arc::new(Inner {
                builder: builder.into(),
                worker: worker.clone(),
                ping_limit: cfg.ping_limit(),
                slot: Mutex::new(Slot {
                    state,
                    conn: None,
                    commands: RemoteCommands::new(),
                    ping: None,
                    next_ping: 0,
                    counted: false,
                }),
            }),
        };
        if worker.is_latent() {
            wfb.register();
        }
        wfb
    }

    fn register(&self) {
        let watcher: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.worker.add_builder(&self.inner.builder, watcher);
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn latent(&self) -> bool {
        self.inner.worker.is_latent()
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_subject(self.inner.worker.name_arc())
            .with_builder(Arc::clone(&self.inner.builder))
    }

    fn publish(&self, ev: Event) {
        self.inner.worker.bus().publish(ev);
    }

    /// Name of the owning builder.
    pub fn builder_name(&self) -> &str {
        &self.inner.builder
    }

    /// The worker this pairing refers to.
    pub fn worker(&self) -> &Worker {
        &self.inner.worker
    }

    /// Current state.
    pub fn state(&self) -> WorkerState {
        self.lock().state
    }

    /// True unless the state is IDLE or LATENT.
    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    /// True while a connection is held.
    pub fn is_attached(&self) -> bool {
        self.lock().conn.is_some()
    }

    /// True if a build may be started here now.
    pub fn is_available(&self) -> bool {
        !self.is_busy() && self.inner.worker.can_start_build()
    }

    /// Version of a remote command, as reported at attach time.
    pub fn remote_command_version(&self, command: &str) -> Option<String> {
        self.lock().commands.get(command).cloned()
    }

    /// Attach handshake completed: stores the connection and command map.
    ///
    /// Eager workers move ATTACHING → IDLE and register with the worker.
    /// Latent workers keep their state; the instance connecting back is part
    /// of substantiation.
    pub fn attached(&self, conn: ConnectionRef, commands: RemoteCommands) -> Result<(), WorkerError> {
        let state = {
            let mut slot = self.lock();
            if !self.latent() {
                slot.state = slot.state.apply(Transition::Attached, false)?;
                self.register();
            }
            slot.conn = Some(conn);
            slot.commands = commands;
            slot.state
        };
        self.publish(self.event(EventKind::WorkerAttached).with_state(state));
        Ok(())
    }

    /// Connection went away: clears it, aborts a ping in flight and falls
    /// back to ATTACHING (eager) or LATENT (latent).
    ///
    /// A connection still held in ATTACHING or LATENT is dropped as well. A
    /// no-op if nothing was attached.
    pub fn detached(&self) {
        let latent = self.latent();
        let (state, ping) = {
            let mut slot = self.lock();
            match slot.state.apply(Transition::Detached, latent) {
                Ok(next) => slot.state = next,
                Err(_) if slot.conn.is_some() => {}
                Err(_) => return,
            }
            slot.conn = None;
            slot.commands.clear();
            (slot.state, slot.ping.take())
        };
        if let Some(ping) = ping {
            ping.abort.abort();
        }
        if !latent {
            self.inner.worker.remove_builder(&self.inner.builder);
        }
        self.publish(self.event(EventKind::WorkerDetached).with_state(state));
    }

    /// A build was assigned: IDLE → BUILDING, counted against the worker.
    pub fn build_started(&self) -> Result<(), WorkerError> {
        let mut slot = self.lock();
        slot.state = slot.state.apply(Transition::BuildStarted, self.latent())?;
        slot.counted = true;
        drop(slot);
        self.inner.worker.build_started();
        Ok(())
    }

    /// True between `build_started()` and `build_finished()`.
    pub(crate) fn has_counted_build(&self) -> bool {
        self.lock().counted
    }

    /// The assigned build finished: BUILDING → IDLE and the worker is told.
    ///
    /// A ping still running for the build is aborted first. If the connection
    /// was lost mid-build the state stays where `detached()` put it.
    pub fn build_finished(&self) -> Result<(), WorkerError> {
        self.abort_ping_if_any();
        let mut slot = self.lock();
        if !slot.counted {
            return Err(WorkerError::InvalidTransition {
                from: slot.state,
                transition: Transition::BuildFinished,
            });
        }
        slot.counted = false;
        if slot.state == WorkerState::Building {
            slot.state = WorkerState::Idle;
        }
        drop(slot);
        self.inner.worker.build_finished();
        Ok(())
    }

    /// Checks the worker is alive. Resolves `true` if it answered.
    ///
    /// Calls made while a ping is outstanding share its result; only one
    /// wire-level ping is sent. A latent worker with no connection resolves
    /// `true` without probing; an eager one resolves `false`.
    pub fn ping(&self) -> impl Future<Output = bool> + Send + 'static {
        let mut slot = self.lock();
        if let Some(ping) = &slot.ping {
            return ping.result.clone().boxed();
        }
        let Some(conn) = slot.conn.clone() else {
            return future::ready(self.latent()).boxed();
        };
        let prior = slot.state;
        let Ok(next) = prior.apply(Transition::PingStarted, self.latent()) else {
            return future::ready(false).boxed();
        };
        slot.state = next;
        slot.next_ping += 1;
        let id = slot.next_ping;

        let me = self.clone();
        let limit = self.inner.ping_limit;
        let handle = tokio::spawn(async move {
            let outcome = send_ping(&conn, limit).await;
            me.finish_ping(id, &conn, outcome)
        });
        let abort = handle.abort_handle();
        let result = async move { handle.await.unwrap_or(false) }
            .boxed()
            .shared();
        slot.ping = Some(InFlightPing {
            id,
            prior,
            abort,
            result: result.clone(),
        });
        drop(slot);

        self.publish(self.event(EventKind::PingSent));
        result.boxed()
    }

    fn finish_ping(&self, id: u64, conn: &ConnectionRef, outcome: Result<(), String>) -> bool {
        {
            let mut slot = self.lock();
            match &slot.ping {
                Some(ping) if ping.id == id => {}
                _ => return false,
            }
            if let Some(ping) = slot.ping.take() {
                if let Ok(prior) = slot.state.apply(Transition::PingFinished(ping.prior), self.latent()) {
                    slot.state = prior;
                }
            }
        }
        match outcome {
            Ok(()) => true,
            Err(reason) => {
                conn.lose_connection();
                self.publish(self.event(EventKind::PingFailed).with_reason(reason));
                false
            }
        }
    }

    /// Aborts an outstanding ping: waiters resolve `false` and the state
    /// before the ping is restored. Returns `false` if none was outstanding.
    pub fn abort_ping_if_any(&self) -> bool {
        let ping = {
            let mut slot = self.lock();
            let Some(ping) = slot.ping.take() else {
                return false;
            };
            if let Ok(prior) = slot.state.apply(Transition::PingFinished(ping.prior), self.latent()) {
                slot.state = prior;
            }
            ping
        };
        ping.abort.abort();
        self.publish(self.event(EventKind::PingFailed).with_reason("ping aborted"));
        true
    }

    /// Gets the worker ready for a build.
    ///
    /// For a LATENT worker the state moves to SUBSTANTIATING before this
    /// returns (so the worker is reserved), then the returned future boots
    /// the instance: IDLE on success, back to LATENT with the typed error on
    /// failure. Everything else resolves `Ok` immediately.
    pub fn prepare(&self) -> BoxFuture<'static, Result<(), WorkerError>> {
        if !self.latent() {
            return future::ready(Ok(())).boxed();
        }
        {
            let mut slot = self.lock();
            if slot.state == WorkerState::Idle {
                return future::ready(Ok(())).boxed();
            }
            match slot.state.apply(Transition::SubstantiationStarted, true) {
                Ok(next) => slot.state = next,
                Err(e) => return future::ready(Err(e)).boxed(),
            }
        }

        let boot = self.inner.worker.substantiate();
        let me = self.clone();
        let handle = tokio::spawn(async move {
            let res = boot.await;
            me.finish_substantiation(res)
        });
        async move {
            handle
                .await
                .unwrap_or(Err(WorkerError::Substantiation(SubstantiationError::Cancelled)))
        }
        .boxed()
    }

    fn finish_substantiation(&self, res: Result<(), SubstantiationError>) -> Result<(), WorkerError> {
        let mut slot = self.lock();
        if slot.state != WorkerState::Substantiating {
            return Err(SubstantiationError::Cancelled.into());
        }
        match res {
            Ok(()) => {
                slot.state = slot.state.apply(Transition::Substantiated, true)?;
                Ok(())
            }
            Err(e) => {
                slot.state = slot.state.apply(Transition::SubstantiationFailed, true)?;
                Err(e.into())
            }
        }
    }

    /// Cancels the worker's boot in flight; a pending `prepare()` fails with
    /// [`SubstantiationError::Cancelled`].
    ///
    /// A SUBSTANTIATING pairing is back in LATENT when this returns.
    pub fn cancel_substantiation(&self) -> bool {
        let reverted = {
            let mut slot = self.lock();
            match slot.state.apply(Transition::SubstantiationFailed, true) {
                Ok(next) => {
                    slot.state = next;
                    true
                }
                Err(_) => false,
            }
        };
        self.inner.worker.cancel_substantiation() || reverted
    }
}

async fn send_ping(conn: &ConnectionRef, limit: Option<Duration>) -> Result<(), String> {
    let call = conn.remote_print(PING_MESSAGE);
    let res = match limit {
        Some(t) => match tokio::time::timeout(t, call).await {
            Ok(res) => res,
            Err(_) => return Err(format!("ping timed out after {t:?}")),
        },
        None => call.await,
    };
    res.map_err(|e| e.to_string())
}

impl std::fmt::Debug for WorkerForBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerForBuilder")
            .field("builder", &self.inner.builder)
            .field("worker", &self.inner.worker.name())
            .field("state", &self.state())
            .finish()
    }
}

impl InstanceWatcher for Inner {
    fn instance_stopped(self: Arc<Self>) {
        WorkerForBuilder { inner: self }.detached();
    }
}
