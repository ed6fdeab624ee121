//! # BotMaster: owns builders and workers, coordinates clean shutdown.
//!
//! The [`BotMaster`] owns the event bus, the [`BuildRequestDistributor`],
//! every [`Builder`] and [`Worker`], and a listener that fans bus events out
//! to the configured subscribers.
//!
//! ## Clean shutdown
//! ```text
//! clean_shutdown(mode):
//!   already shutting down ─► (Quick over Graceful escalates) ─► AlreadyInProgress
//!
//!   Graceful: admission = WaitedForOnly   (drain, waited-for children still start)
//!   Quick:    distribution stopped
//!
//!   loop {
//!     builds = every running build            (none ─► break)
//!     Quick: stop each with classify_stopped_build(waited_for), abort its ping
//!            (a build still booting its latent worker cancels the boot)
//!     wait for all of them, or
//!        cancel_clean_shutdown() ─► Cancelled
//!        escalation to Quick     ─► go round again in Quick
//!   }
//!   distribution stopped ─► ShutdownComplete ─► Stopper::stop() (exactly once)
//! ```
//!
//! The loop re-checks after every wait: builds started meanwhile (waited-for
//! children) are waited for too. A build finishing while the re-check runs
//! is at worst observed twice, never missed.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{RuntimeError, WorkerError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;
use crate::workers::{ConnectionRef, RemoteCommands, Worker};

use super::build::{BuildRunner, RunningBuildRef};
use super::builder::Builder;
use super::distributor::{Admission, BuildRequestDistributor};
use super::results::classify_stopped_build;
use super::signals::{self, ShutdownSignal};

/// Stops the hosting process once a clean shutdown completes.
#[async_trait]
pub trait Stopper: Send + Sync + 'static {
    /// Stops the process (or whatever hosts the master).
    async fn stop(&self);
}

/// How running builds are treated by a clean shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Let running builds finish.
    Graceful,
    /// Stop running builds (RETRY, or CANCELLED when waited for).
    Quick,
}

impl ShutdownMode {
    /// Lower-case mode name, used as event reason.
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownMode::Graceful => "graceful",
            ShutdownMode::Quick => "quick",
        }
    }
}

/// What a call to [`BotMaster::clean_shutdown`] ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The stopper was invoked.
    Completed,
    /// Another call is driving (or has driven) the shutdown; nothing was done.
    AlreadyInProgress,
    /// The shutdown was cancelled before it completed.
    Cancelled,
}

enum Phase {
    Running,
    ShuttingDown {
        mode: ShutdownMode,
        cancel: CancellationToken,
        escalate: CancellationToken,
    },
    Stopped,
}

struct Inner {
    cfg: Config,
    bus: Bus,
    distributor: BuildRequestDistributor,
    builders: Mutex<Vec<Builder>>,
    workers: Mutex<Vec<Worker>>,
    stopper: Arc<dyn Stopper>,
    phase: Mutex<Phase>,
    listener: CancellationToken,
    listener_task: Mutex<Option<JoinHandle<()>>>,
}

/// Build master core. Clones share state.
#[derive(Clone)]
pub struct BotMaster {
    inner: Arc<Inner>,
}

impl BotMaster {
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: SubscriberSet,
        stopper: Arc<dyn Stopper>,
    ) -> Self {
        let distributor = BuildRequestDistributor::new(&cfg, bus.clone());
        let me = Self {
            inner: Arc::new(Inner {
                cfg,
                bus,
                distributor,
                builders: Mutex::new(Vec::new()),
                workers: Mutex::new(Vec::new()),
                stopper,
                phase: Mutex::new(Phase::Running),
                listener: CancellationToken::new(),
                listener_task: Mutex::new(None),
            }),
        };
        me.subscriber_listener(subs);
        me
    }

    /// Forwards bus events to the subscriber set until [`BotMaster::close`].
    fn subscriber_listener(&self, subs: SubscriberSet) {
        let mut rx = self.inner.bus.subscribe();
        let token = self.inner.listener.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => subs.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            subs.shutdown().await;
        });
        *self
            .inner
            .listener_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.inner.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Event bus shared by every component of this master.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Configuration the master was built with.
    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }

    /// The build request distributor.
    pub fn distributor(&self) -> &BuildRequestDistributor {
        &self.inner.distributor
    }

    /// Registers a worker; builders added later may be paired with it.
    pub fn add_worker(&self, worker: Worker) {
        let mut workers = self.inner.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if !workers.iter().any(|w| w.name() == worker.name()) {
            workers.push(worker);
        }
    }

    /// Looks up a registered worker.
    pub fn worker(&self, name: &str) -> Option<Worker> {
        self.inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|w| w.name() == name)
            .cloned()
    }

    /// Creates a builder paired with the named (registered) workers and hands
    /// it to the distributor. Unknown worker names are skipped.
    pub fn add_builder(
        &self,
        name: impl Into<Arc<str>>,
        runner: Arc<dyn BuildRunner>,
        workers: &[&str],
    ) -> Builder {
        let builder = Builder::new(name, &self.inner.cfg, self.inner.bus.clone(), runner);
        for worker in workers.iter().filter_map(|w| self.worker(w)) {
            builder.add_worker(&worker);
        }
        self.inner.distributor.add_builder(&builder);
        self.inner
            .builders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(builder.clone());
        builder
    }

    /// Every builder, in registration order.
    pub fn builders(&self) -> Vec<Builder> {
        self.inner
            .builders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Looks up a builder.
    pub fn builder(&self, name: &str) -> Option<Builder> {
        self.builders().into_iter().find(|b| b.name() == name)
    }

    /// A worker connected: every builder paired with it gets the connection,
    /// then distribution runs.
    pub fn worker_attached(
        &self,
        worker: &str,
        conn: ConnectionRef,
        commands: RemoteCommands,
    ) -> Result<(), WorkerError> {
        let paired: Vec<_> = self
            .builders()
            .iter()
            .filter_map(|b| b.worker_for(worker))
            .collect();
        if paired.is_empty() {
            return Err(WorkerError::NotAttached {
                worker: worker.to_string(),
            });
        }
        let mut first_err = None;
        for wfb in paired {
            if let Err(e) = wfb.attached(Arc::clone(&conn), commands.clone()) {
                first_err.get_or_insert(e);
            }
        }
        self.inner.distributor.trigger();
        first_err.map_or(Ok(()), Err)
    }

    /// A worker's connection went away.
    pub fn worker_detached(&self, worker: &str) {
        for wfb in self.builders().iter().filter_map(|b| b.worker_for(worker)) {
            wfb.detached();
        }
    }

    /// Every running build across builders.
    pub fn running_builds(&self) -> Vec<RunningBuildRef> {
        self.builders()
            .iter()
            .flat_map(|b| b.running_builds())
            .collect()
    }

    /// True from the start of a clean shutdown until it is cancelled.
    pub fn is_shutting_down(&self) -> bool {
        !matches!(*self.phase(), Phase::Running)
    }

    /// Shuts the master down without corrupting build state.
    ///
    /// Calling it while a shutdown is pending is a no-op returning
    /// [`ShutdownOutcome::AlreadyInProgress`], except that a `Quick` call
    /// escalates a pending `Graceful` one.
    pub async fn clean_shutdown(&self, mode: ShutdownMode) -> ShutdownOutcome {
        let (cancel, escalate) = {
            let mut phase = self.phase();
            match &mut *phase {
                Phase::Running => {}
                Phase::ShuttingDown {
                    mode: current,
                    escalate,
                    ..
                } => {
                    if mode == ShutdownMode::Quick && *current == ShutdownMode::Graceful {
                        *current = ShutdownMode::Quick;
                        escalate.cancel();
                    }
                    return ShutdownOutcome::AlreadyInProgress;
                }
                Phase::Stopped => return ShutdownOutcome::AlreadyInProgress,
            }
            let cancel = CancellationToken::new();
            let escalate = CancellationToken::new();
            *phase = Phase::ShuttingDown {
                mode,
                cancel: cancel.clone(),
                escalate: escalate.clone(),
            };
            self.inner.distributor.set_admission(match mode {
                ShutdownMode::Graceful => Admission::WaitedForOnly,
                ShutdownMode::Quick => Admission::Nothing,
            });
            (cancel, escalate)
        };
        self.inner.bus.publish(
            Event::new(EventKind::ShutdownRequested).with_reason(mode.as_str()),
        );

        let mut quick = mode == ShutdownMode::Quick;
        if quick {
            self.inner.distributor.stop().await;
        }

        loop {
            if !quick && escalate.is_cancelled() {
                quick = true;
                self.inner.distributor.stop().await;
            }

            let builds = self.running_builds();
            if builds.is_empty() {
                break;
            }
            if quick {
                for build in &builds {
                    build.stop(
                        classify_stopped_build(build.request().waited_for),
                        "master shutdown",
                    );
                    build.worker().abort_ping_if_any();
                }
            }

            let waiting = u32::try_from(builds.len()).unwrap_or(u32::MAX);
            self.inner
                .bus
                .publish(Event::new(EventKind::ShutdownWaiting).with_attempt(waiting));

            let all_finished = join_all(builds.iter().map(|b| b.wait_finished()));
            tokio::select! {
                _ = all_finished => {}
                _ = cancel.cancelled() => return self.cancelled(),
                _ = escalate.cancelled(), if !quick => {}
            }
        }

        {
            let mut phase = self.phase();
            if cancel.is_cancelled() {
                drop(phase);
                return self.cancelled();
            }
            *phase = Phase::Stopped;
        }
        self.inner.distributor.stop().await;
        self.inner.bus.publish(Event::new(EventKind::ShutdownComplete));
        self.inner.stopper.stop().await;
        ShutdownOutcome::Completed
    }

    fn cancelled(&self) -> ShutdownOutcome {
        self.inner.bus.publish(Event::new(EventKind::ShutdownCancelled));
        ShutdownOutcome::Cancelled
    }

    /// Cancels a pending graceful shutdown and restores normal distribution.
    ///
    /// Running builds are not affected. Returns `false` if there was nothing
    /// to cancel (no shutdown, a quick one, or one that already completed).
    pub fn cancel_clean_shutdown(&self) -> bool {
        let mut phase = self.phase();
        let cancel = match &*phase {
            Phase::ShuttingDown {
                mode: ShutdownMode::Graceful,
                cancel,
                ..
            } => cancel.clone(),
            _ => return false,
        };
        *phase = Phase::Running;
        cancel.cancel();
        self.inner.distributor.set_admission(Admission::All);
        true
    }

    /// Waits for a termination signal, then shuts down in the mode it asks
    /// for (see [`ShutdownSignal::mode`]); a second signal during a graceful
    /// drain escalates to a quick shutdown.
    pub async fn run_until_signal(&self) -> Result<ShutdownOutcome, RuntimeError> {
        self.shutdown_on(signals::wait_for_shutdown_signal).await
    }

    async fn shutdown_on<F, Fut>(&self, mut next_signal: F) -> Result<ShutdownOutcome, RuntimeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::io::Result<ShutdownSignal>>,
    {
        let first = next_signal().await?;
        self.signal_received(first);

        let shutdown = self.clean_shutdown(first.mode());
        tokio::pin!(shutdown);
        if first.mode() == ShutdownMode::Quick {
            return Ok(shutdown.await);
        }
        tokio::select! {
            outcome = &mut shutdown => Ok(outcome),
            res = next_signal() => {
                self.signal_received(res?);
                self.clean_shutdown(ShutdownMode::Quick).await;
                Ok(shutdown.await)
            }
        }
    }

    fn signal_received(&self, signal: ShutdownSignal) {
        self.inner
            .bus
            .publish(Event::new(EventKind::SignalReceived).with_reason(signal.as_str()));
    }

    /// Stops the subscriber listener and drains subscriber queues.
    pub async fn close(&self) {
        self.inner.listener.cancel();
        let handle = self
            .inner
            .listener_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::results::BuildResult;
    use crate::master::request::BuildRequest;
    use crate::master::setup::BotMasterBuilder;
    use crate::master::testing::{CountingStopper, GatedRunner, settle};
    use crate::workers::{MockConnection, MockDriver, WorkerState};
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    /// Signal source fed by oneshot senders; pends forever once drained.
    fn scripted(
        receivers: Vec<oneshot::Receiver<ShutdownSignal>>,
    ) -> impl FnMut() -> futures::future::BoxFuture<'static, std::io::Result<ShutdownSignal>> {
        use futures::FutureExt;
        let mut queue: VecDeque<_> = receivers.into();
        move || {
            let next = queue.pop_front();
            async move {
                match next {
                    Some(rx) => rx.await.map_err(std::io::Error::other),
                    None => futures::future::pending().await,
                }
            }
            .boxed()
        }
    }

    fn master(stopper: &Arc<CountingStopper>) -> BotMaster {
        let bm = BotMasterBuilder::new(Config::default())
            .with_stopper(stopper.clone())
            .build();
        bm.add_worker(Worker::new("w0", bm.config(), bm.bus().clone()));
        bm.add_worker(Worker::new("w1", bm.config(), bm.bus().clone()));
        bm
    }

    fn attach(bm: &BotMaster, workers: &[&str]) {
        for w in workers {
            bm.worker_attached(w, MockConnection::answering(), RemoteCommands::new())
                .unwrap();
        }
    }

    #[tokio::test]
    async fn idle_shutdown_stops_immediately() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);

        assert_eq!(
            bm.clean_shutdown(ShutdownMode::Graceful).await,
            ShutdownOutcome::Completed
        );
        assert_eq!(stopper.calls(), 1);
        assert_eq!(
            bm.clean_shutdown(ShutdownMode::Graceful).await,
            ShutdownOutcome::AlreadyInProgress
        );
        assert_eq!(stopper.calls(), 1);
    }

    #[tokio::test]
    async fn graceful_shutdown_twice_stops_once_after_build() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);
        let runner = GatedRunner::new(BuildResult::Success);
        let builder = bm.add_builder("linux", runner.clone(), &["w0"]);
        attach(&bm, &["w0"]);

        builder.submit(BuildRequest::new(1));
        settle(|| runner.runs() == 1).await;

        let first = tokio::spawn({
            let bm = bm.clone();
            async move { bm.clean_shutdown(ShutdownMode::Graceful).await }
        });
        settle(|| bm.is_shutting_down()).await;

        assert_eq!(
            bm.clean_shutdown(ShutdownMode::Graceful).await,
            ShutdownOutcome::AlreadyInProgress
        );
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(stopper.calls(), 0);

        runner.release();
        assert_eq!(first.await.unwrap(), ShutdownOutcome::Completed);
        assert_eq!(stopper.calls(), 1);
    }

    #[tokio::test]
    async fn graceful_drain_refuses_new_work_but_starts_waited_for() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);
        let runner = GatedRunner::new(BuildResult::Success);
        let builder = bm.add_builder("linux", runner.clone(), &["w0", "w1"]);
        attach(&bm, &["w0", "w1"]);

        builder.submit(BuildRequest::new(1));
        settle(|| runner.runs() == 1).await;

        let shutdown = tokio::spawn({
            let bm = bm.clone();
            async move { bm.clean_shutdown(ShutdownMode::Graceful).await }
        });
        settle(|| bm.is_shutting_down()).await;

        builder.submit(BuildRequest::new(2));
        builder.submit(BuildRequest::new(3).waited_for(true));
        settle(|| runner.runs() == 2).await;
        assert_eq!(runner.started(), vec![1, 3]);
        assert_eq!(builder.pending_requests(), vec![BuildRequest::new(2)]);

        runner.release();
        assert_eq!(shutdown.await.unwrap(), ShutdownOutcome::Completed);
        assert_eq!(stopper.calls(), 1);
        assert_eq!(builder.pending_requests(), vec![BuildRequest::new(2)]);
    }

    #[tokio::test]
    async fn quick_shutdown_classifies_stopped_builds() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);
        let runner = GatedRunner::new(BuildResult::Success);
        let builder = bm.add_builder("linux", runner.clone(), &["w0", "w1"]);
        attach(&bm, &["w0", "w1"]);

        builder.submit(BuildRequest::new(1));
        builder.submit(BuildRequest::new(2).waited_for(true));
        settle(|| runner.runs() == 2).await;
        let builds = bm.running_builds();

        assert_eq!(
            bm.clean_shutdown(ShutdownMode::Quick).await,
            ShutdownOutcome::Completed
        );
        assert_eq!(stopper.calls(), 1);
        for build in builds {
            let expected = if build.request().waited_for {
                BuildResult::Cancelled
            } else {
                BuildResult::Retry
            };
            assert_eq!(build.wait_finished().await, expected);
        }
        assert_eq!(builder.pending_requests(), vec![BuildRequest::new(1)]);
        assert_eq!(runner.runs(), 2);
    }

    #[tokio::test]
    async fn quick_shutdown_cancels_a_boot_in_flight() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);
        bm.add_worker(Worker::latent(
            "cloud",
            bm.config(),
            bm.bus().clone(),
            MockDriver::gated(),
        ));
        let runner = GatedRunner::new(BuildResult::Success);
        let builder = bm.add_builder("linux", runner.clone(), &["cloud"]);
        let wfb = builder.worker_for("cloud").unwrap();

        builder.submit(BuildRequest::new(1));
        settle(|| wfb.state() == WorkerState::Substantiating).await;

        assert_eq!(
            bm.clean_shutdown(ShutdownMode::Quick).await,
            ShutdownOutcome::Completed
        );
        assert_eq!(wfb.state(), WorkerState::Latent);
        assert!(!bm.worker("cloud").unwrap().cancel_substantiation());
        assert_eq!(builder.pending_requests(), vec![BuildRequest::new(1)]);
        assert_eq!(runner.runs(), 0);
        assert_eq!(stopper.calls(), 1);
    }

    #[tokio::test]
    async fn second_signal_escalates_the_drain() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);
        let mut events = bm.bus().subscribe();
        let runner = GatedRunner::new(BuildResult::Success);
        let builder = bm.add_builder("linux", runner.clone(), &["w0"]);
        attach(&bm, &["w0"]);
        builder.submit(BuildRequest::new(1));
        settle(|| runner.runs() == 1).await;

        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        first_tx.send(ShutdownSignal::Interrupt).unwrap();
        let (outcome, ()) = tokio::join!(bm.shutdown_on(scripted(vec![first_rx, second_rx])), async {
            settle(|| bm.is_shutting_down()).await;
            second_tx.send(ShutdownSignal::Terminate).unwrap();
        });

        assert_eq!(outcome.unwrap(), ShutdownOutcome::Completed);
        assert_eq!(stopper.calls(), 1);
        assert_eq!(builder.pending_requests(), vec![BuildRequest::new(1)]);

        let mut received = Vec::new();
        while let Ok(ev) = events.try_recv() {
            if ev.kind == EventKind::SignalReceived {
                received.push(ev.reason.map(|r| r.to_string()));
            }
        }
        assert_eq!(
            received,
            vec![Some("SIGINT".to_string()), Some("SIGTERM".to_string())]
        );
    }

    #[tokio::test]
    async fn quit_signal_stops_builds_at_once() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);
        let runner = GatedRunner::new(BuildResult::Success);
        let builder = bm.add_builder("linux", runner.clone(), &["w0"]);
        attach(&bm, &["w0"]);
        builder.submit(BuildRequest::new(1));
        settle(|| runner.runs() == 1).await;

        let (tx, rx) = oneshot::channel();
        tx.send(ShutdownSignal::Quit).unwrap();
        let outcome = bm.shutdown_on(scripted(vec![rx])).await;

        assert_eq!(outcome.unwrap(), ShutdownOutcome::Completed);
        assert_eq!(builder.pending_requests(), vec![BuildRequest::new(1)]);
        assert_eq!(stopper.calls(), 1);
    }

    #[tokio::test]
    async fn cancel_restores_distribution() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);
        let runner = GatedRunner::new(BuildResult::Success);
        let builder = bm.add_builder("linux", runner.clone(), &["w0", "w1"]);
        attach(&bm, &["w0", "w1"]);

        builder.submit(BuildRequest::new(1));
        settle(|| runner.runs() == 1).await;

        let shutdown = tokio::spawn({
            let bm = bm.clone();
            async move { bm.clean_shutdown(ShutdownMode::Graceful).await }
        });
        settle(|| bm.is_shutting_down()).await;
        builder.submit(BuildRequest::new(2));

        assert!(bm.cancel_clean_shutdown());
        assert_eq!(shutdown.await.unwrap(), ShutdownOutcome::Cancelled);
        assert!(!bm.is_shutting_down());
        assert_eq!(bm.distributor().admission(), Admission::All);

        settle(|| runner.runs() == 2).await;
        assert_eq!(stopper.calls(), 0);
        assert!(!bm.cancel_clean_shutdown());
    }

    #[tokio::test]
    async fn quick_escalates_pending_graceful() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);
        let runner = GatedRunner::new(BuildResult::Success);
        let builder = bm.add_builder("linux", runner.clone(), &["w0"]);
        attach(&bm, &["w0"]);

        builder.submit(BuildRequest::new(1));
        settle(|| runner.runs() == 1).await;

        let graceful = tokio::spawn({
            let bm = bm.clone();
            async move { bm.clean_shutdown(ShutdownMode::Graceful).await }
        });
        settle(|| bm.is_shutting_down()).await;

        assert_eq!(
            bm.clean_shutdown(ShutdownMode::Quick).await,
            ShutdownOutcome::AlreadyInProgress
        );
        assert_eq!(graceful.await.unwrap(), ShutdownOutcome::Completed);
        assert_eq!(stopper.calls(), 1);
        assert_eq!(builder.pending_requests(), vec![BuildRequest::new(1)]);
        assert!(!bm.cancel_clean_shutdown());
    }

    #[tokio::test]
    async fn attach_to_unknown_worker_is_rejected() {
        let stopper = CountingStopper::new();
        let bm = master(&stopper);
        let err = bm
            .worker_attached("ghost", MockConnection::answering(), RemoteCommands::new())
            .unwrap_err();
        assert_eq!(err.as_label(), "worker_not_attached");
    }
}
