//! # Builder: a queue of build requests and the workers that can serve it.
//!
//! The distributor calls [`Builder::maybe_start_builds`] once per round. Each
//! call pairs queued requests with available workers until one side runs out:
//!
//! ```text
//! maybe_start_builds(admission):
//!   loop {
//!     request = first queued request the admission lets through    (none ─► stop)
//!     worker  = random pick among available worker-builders        (none ─► stop)
//!     reserve the worker synchronously:
//!        LATENT ─► prepare()         (state SUBSTANTIATING)
//!        else   ─► build_started()   (state BUILDING)
//!     spawn the build
//!   }
//!
//! build task:
//!   select {
//!     substantiate (latent) ─► ping ─► runner.run_build()
//!     stop(result)           ─► cancel a boot in flight     ─► that result
//!   }
//!   RETRY ─► request goes back to the front of the queue
//! ```
//!
//! A failed ping or substantiation ends the build as RETRY and remembers the
//! worker for that request. Distribution is triggered again only if another
//! available worker has not failed the request yet, so two broken workers
//! cannot bounce a request between them; once every worker has failed it,
//! the next attach, submit or finished build tries them all again.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use rand::Rng;

use crate::config::Config;
use crate::error::WorkerError;
use crate::events::{Bus, Event, EventKind};
use crate::processing::Trigger;
use crate::workers::{Worker, WorkerForBuilder, WorkerState};

use super::build::{BuildRunner, RunningBuild, RunningBuildRef};
use super::distributor::Admission;
use super::request::BuildRequest;
use super::results::BuildResult;

#[derive(Default)]
struct BuilderState {
    queue: VecDeque<BuildRequest>,
    workers: Vec<WorkerForBuilder>,
    running: Vec<RunningBuildRef>,
    next_number: u64,
    /// Request id ─► workers that failed to start it since it was queued.
    failed_starts: HashMap<u64, Vec<Arc<str>>>,
}

impl BuilderState {
    fn failed_on(&self, request: u64, wfb: &WorkerForBuilder) -> bool {
        self.failed_starts
            .get(&request)
            .is_some_and(|names| names.iter().any(|n| **n == *wfb.worker().name()))
    }
}

struct Inner {
    name: Arc<str>,
    cfg: Config,
    bus: Bus,
    runner: Arc<dyn BuildRunner>,
    state: Mutex<BuilderState>,
    distributor: Mutex<Trigger>,
}

/// Build queue plus its worker pairings. Clones share state.
#[derive(Clone)]
pub struct Builder {
    inner: Arc<Inner>,
}

impl Builder {
    /// Creates a builder with an empty queue and no workers.
    pub fn new(
        name: impl Into<Arc<str>>,
        cfg: &Config,
        bus: Bus,
        runner: Arc<dyn BuildRunner>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                cfg: cfg.clone(),
                bus,
                runner,
                state: Mutex::new(BuilderState::default()),
                distributor: Mutex::new(Trigger::detached()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BuilderState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Builder name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn set_distributor(&self, trigger: Trigger) {
        *self
            .inner
            .distributor
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = trigger;
    }

    fn poke_distributor(&self) {
        self.inner
            .distributor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .trigger();
    }

    /// Pairs this builder with `worker`; returns the existing pairing if any.
    pub fn add_worker(&self, worker: &Worker) -> WorkerForBuilder {
        let mut st = self.lock();
        if let Some(existing) = st.workers.iter().find(|w| w.worker().name() == worker.name()) {
            return existing.clone();
        }
        let wfb = WorkerForBuilder::new(Arc::clone(&self.inner.name), worker, &self.inner.cfg);
        st.workers.push(wfb.clone());
        wfb
    }

    /// The pairing with the named worker.
    pub fn worker_for(&self, worker: &str) -> Option<WorkerForBuilder> {
        self.lock()
            .workers
            .iter()
            .find(|w| w.worker().name() == worker)
            .cloned()
    }

    /// Every worker pairing, in the order they were added.
    pub fn workers(&self) -> Vec<WorkerForBuilder> {
        self.lock().workers.clone()
    }

    /// Queues a request and asks for distribution.
    pub fn submit(&self, request: BuildRequest) {
        self.lock().queue.push_back(request);
        self.poke_distributor();
    }

    /// Requests still waiting for a worker, oldest first.
    pub fn pending_requests(&self) -> Vec<BuildRequest> {
        self.lock().queue.iter().cloned().collect()
    }

    pub(crate) fn has_admitted(&self, admission: Admission) -> bool {
        self.lock().queue.iter().any(|r| admission.admits(r))
    }

    /// Builds currently in progress (including workers still booting for them).
    pub fn running_builds(&self) -> Vec<RunningBuildRef> {
        self.lock().running.clone()
    }

    /// Starts as many admitted requests as there are available workers.
    ///
    /// Returns the number of builds started.
    pub fn maybe_start_builds(&self, admission: Admission) -> usize {
        let mut started = 0;
        loop {
            let mut st = self.lock();
            let Some(idx) = st.queue.iter().position(|r| admission.admits(r)) else {
                break;
            };
            let request_id = st.queue[idx].id;
            let available: Vec<&WorkerForBuilder> =
                st.workers.iter().filter(|w| w.is_available()).collect();
            if available.is_empty() {
                break;
            }
            let untried: Vec<&WorkerForBuilder> = available
                .iter()
                .copied()
                .filter(|w| !st.failed_on(request_id, w))
                .collect();
            let pool = if untried.is_empty() { &available } else { &untried };
            let wfb = pool[rand::rng().random_range(0..pool.len())].clone();

            let prepare = match reserve(&wfb) {
                Ok(prepare) => prepare,
                Err(e) => {
                    self.inner.bus.publish(
                        Event::new(EventKind::ProcessorFailed)
                            .with_subject(Arc::clone(&self.inner.name))
                            .with_reason(e.to_string()),
                    );
                    break;
                }
            };
            let Some(request) = st.queue.remove(idx) else {
                break;
            };
            st.next_number += 1;
            let build = RunningBuild::new(
                st.next_number,
                Arc::clone(&self.inner.name),
                request,
                wfb,
            );
            st.running.push(Arc::clone(&build));
            drop(st);

            self.spawn_build(build, prepare);
            started += 1;
        }
        started
    }

    fn spawn_build(&self, build: RunningBuildRef, prepare: Option<BoxFuture<'static, Result<(), WorkerError>>>) {
        let me = self.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = build.cancel_token().cancelled() => {
                    if build.worker().state() == WorkerState::Substantiating {
                        build.worker().cancel_substantiation();
                    }
                    Ok(build.stopped_with().unwrap_or(BuildResult::Cancelled))
                }
                res = me.execute(&build, prepare) => res,
            };
            me.complete(&build, outcome);
        });
    }

    /// Substantiates (latent), pings, then runs the build.
    ///
    /// `Err` carries the reason the build never really started.
    async fn execute(
        &self,
        build: &RunningBuild,
        prepare: Option<BoxFuture<'static, Result<(), WorkerError>>>,
    ) -> Result<BuildResult, String> {
        let wfb = build.worker();
        if let Some(prepare) = prepare {
            prepare.await.map_err(|e| e.to_string())?;
            wfb.build_started().map_err(|e| e.to_string())?;
        }
        self.inner.bus.publish(
            Event::new(EventKind::BuildStarted)
                .with_subject(wfb.worker().name_arc())
                .with_builder(Arc::clone(&self.inner.name))
                .with_build(build.number()),
        );

        if !wfb.ping().await {
            wfb.detached();
            return Err(format!("worker {} did not answer ping", wfb.worker().name()));
        }
        Ok(self.inner.runner.run_build(build).await)
    }

    fn complete(&self, build: &RunningBuild, outcome: Result<BuildResult, String>) {
        let wfb = build.worker();
        // Latent builds stopped or failed before build_started() were never counted.
        if wfb.has_counted_build() {
            if let Err(e) = wfb.build_finished() {
                self.inner.bus.publish(
                    Event::new(EventKind::ProcessorFailed)
                        .with_subject(Arc::clone(&self.inner.name))
                        .with_reason(e.to_string()),
                );
            }
        }

        let (result, failed_to_start) = match &outcome {
            Ok(result) => (*result, false),
            Err(_) => (BuildResult::Retry, true),
        };
        self.inner.bus.publish(
            Event::new(EventKind::BuildFinished)
                .with_subject(wfb.worker().name_arc())
                .with_builder(Arc::clone(&self.inner.name))
                .with_build(build.number())
                .with_result(result),
        );

        let request_id = build.request().id;
        let retry_elsewhere = {
            let mut st = self.lock();
            st.running.retain(|b| b.number() != build.number());
            if failed_to_start {
                st.failed_starts
                    .entry(request_id)
                    .or_default()
                    .push(wfb.worker().name_arc());
            } else {
                st.failed_starts.remove(&request_id);
            }
            if result == BuildResult::Retry {
                st.queue.push_front(build.request().clone());
            }
            failed_to_start
                && st
                    .workers
                    .iter()
                    .any(|w| w.is_available() && !st.failed_on(request_id, w))
        };
        if result == BuildResult::Retry {
            let reason = match outcome {
                Err(reason) => reason,
                Ok(_) => "build stopped".to_string(),
            };
            self.inner.bus.publish(
                Event::new(EventKind::BuildRequeued)
                    .with_builder(Arc::clone(&self.inner.name))
                    .with_reason(reason),
            );
        }

        build.finish(result);
        if !failed_to_start || retry_elsewhere {
            self.poke_distributor();
        }
    }
}

/// Marks the worker busy before the build task runs.
fn reserve(
    wfb: &WorkerForBuilder,
) -> Result<Option<BoxFuture<'static, Result<(), WorkerError>>>, WorkerError> {
    if wfb.state() == WorkerState::Latent {
        Ok(Some(wfb.prepare()))
    } else {
        wfb.build_started().map(|()| None)
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("Builder")
            .field("name", &self.inner.name)
            .field("queued", &st.queue.len())
            .field("running", &st.running.len())
            .finish()
    }
}
