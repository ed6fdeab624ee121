//! # Worker: the pool-level view of one remote worker.
//!
//! A [`Worker`] is shared by every builder that may use it. It owns the
//! bookkeeping that spans builders:
//!
//! - the concurrent build count and its cap (`max_builds`);
//! - the set of builders currently registered with it;
//! - for latent workers, the on-demand instance lifecycle.
//!
//! ## Substantiation
//! ```text
//! substantiate() ──► substantiated? ──yes──► Ok
//!        │ no
//!        ▼
//!   boot in flight? ──yes──► join it (one boot shared by all callers)
//!        │ no
//!        ▼
//!   spawn boot task:
//!     select {
//!       driver.start_instance()      → Ok / Failed
//!       sleep(substantiation_limit)  → Timeout
//!       cancel.cancelled()           → Cancelled
//!     }
//!   publish Substantiated / SubstantiationFailed
//! ```
//!
//! The boot runs on its own task, so callers dropping their future does not
//! abandon it halfway.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::SubstantiationError;
use crate::events::{Bus, Event, EventKind};

/// Backend that boots and stops the instance behind a latent worker.
#[async_trait]
pub trait LatentDriver: Send + Sync + 'static {
    /// Boots the instance; completes once it is ready to take builds.
    async fn start_instance(&self) -> Result<(), SubstantiationError>;

    /// Stops the instance.
    async fn stop_instance(&self);
}

/// Builder-side pairing told when the latent instance goes away.
pub(crate) trait InstanceWatcher: Send + Sync {
    fn instance_stopped(self: Arc<Self>);
}

struct Registration {
    builder: Arc<str>,
    watcher: Weak<dyn InstanceWatcher>,
}

type Boot = Shared<BoxFuture<'static, Result<(), SubstantiationError>>>;

struct InFlightBoot {
    epoch: u64,
    cancel: CancellationToken,
    result: Boot,
}

#[derive(Default)]
struct PoolState {
    running: usize,
    builders: Vec<Registration>,
    substantiated: bool,
    boot: Option<InFlightBoot>,
    epoch: u64,
}

struct Inner {
    name: Arc<str>,
    bus: Bus,
    max_builds: Option<usize>,
    substantiation_limit: Option<Duration>,
    driver: Option<Arc<dyn LatentDriver>>,
    state: Mutex<PoolState>,
}

/// Shared handle to a worker; clones refer to the same worker.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<Inner>,
}

impl Worker {
    /// Creates an always-on worker.
    pub fn new(name: impl Into<Arc<str>>, cfg: &Config, bus: Bus) -> Self {
        Self::build(name.into(), cfg, bus, None)
    }

    /// Creates a worker backed by an on-demand instance.
    pub fn latent(
        name: impl Into<Arc<str>>,
        cfg: &Config,
        bus: Bus,
        driver: Arc<dyn LatentDriver>,
    ) -> Self {
        Self::build(name.into(), cfg, bus, Some(driver))
    }

    fn build(
        name: Arc<str>,
        cfg: &Config,
        bus: Bus,
        driver: Option<Arc<dyn LatentDriver>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                bus,
                max_builds: cfg.build_limit(),
                substantiation_limit: cfg.substantiation_limit(),
                driver,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Worker name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.inner.name)
    }

    /// Event bus this worker publishes on.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// True for on-demand workers.
    pub fn is_latent(&self) -> bool {
        self.inner.driver.is_some()
    }

    /// True if the worker may take one more build.
    pub fn can_start_build(&self) -> bool {
        match self.inner.max_builds {
            Some(max) => self.lock().running < max,
            None => true,
        }
    }

    /// Number of builds currently running on this worker.
    pub fn running_builds(&self) -> usize {
        self.lock().running
    }

    pub(crate) fn build_started(&self) {
        self.lock().running += 1;
    }

    pub(crate) fn build_finished(&self) {
        let mut st = self.lock();
        st.running = st.running.saturating_sub(1);
    }

    pub(crate) fn add_builder(&self, builder: &Arc<str>, watcher: Weak<dyn InstanceWatcher>) {
        let mut st = self.lock();
        if !st.builders.iter().any(|r| r.builder == *builder) {
            st.builders.push(Registration {
                builder: Arc::clone(builder),
                watcher,
            });
        }
    }

    pub(crate) fn remove_builder(&self, builder: &str) {
        self.lock().builders.retain(|r| &*r.builder != builder);
    }

    /// Names of the builders currently registered with this worker.
    pub fn registered_builders(&self) -> Vec<Arc<str>> {
        self.lock()
            .builders
            .iter()
            .map(|r| Arc::clone(&r.builder))
            .collect()
    }

    /// True once a latent instance is up (always false for eager workers).
    pub fn is_substantiated(&self) -> bool {
        self.lock().substantiated
    }

    /// Boots the latent instance, joining a boot already in flight.
    ///
    /// Eager workers resolve `Ok` immediately.
    pub fn substantiate(&self) -> impl Future<Output = Result<(), SubstantiationError>> + Send + 'static {
        let Some(driver) = self.inner.driver.clone() else {
            return future::ready(Ok(())).boxed();
        };

        let mut st = self.lock();
        if st.substantiated {
            return future::ready(Ok(())).boxed();
        }
        if let Some(boot) = &st.boot {
            return boot.result.clone().boxed();
        }

        st.epoch += 1;
        let epoch = st.epoch;
        let cancel = CancellationToken::new();
        let limit = self.inner.substantiation_limit;

        let me = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let res = Self::boot(driver, limit, token).await;
            me.finish_boot(epoch, &res);
            res
        });
        let result: Boot = async move {
            handle
                .await
                .unwrap_or(Err(SubstantiationError::Cancelled))
        }
        .boxed()
        .shared();

        st.boot = Some(InFlightBoot {
            epoch,
            cancel,
            result: result.clone(),
        });
        drop(st);

        self.inner
            .bus
            .publish(Event::new(EventKind::SubstantiationStarted).with_subject(self.name_arc()));
        result.boxed()
    }

    async fn boot(
        driver: Arc<dyn LatentDriver>,
        limit: Option<Duration>,
        cancel: CancellationToken,
    ) -> Result<(), SubstantiationError> {
        let start = driver.start_instance();
        tokio::select! {
            res = start => res,
            _ = cancel.cancelled() => Err(SubstantiationError::Cancelled),
            _ = async {
                match limit {
                    Some(t) => tokio::time::sleep(t).await,
                    None => future::pending::<()>().await,
                }
            } => Err(SubstantiationError::Timeout {
                timeout: limit.unwrap_or_default(),
            }),
        }
    }

    fn finish_boot(&self, epoch: u64, res: &Result<(), SubstantiationError>) {
        {
            let mut st = self.lock();
            if st.boot.as_ref().map(|b| b.epoch) != Some(epoch) {
                return;
            }
            st.boot = None;
            st.substantiated = res.is_ok();
        }
        let ev = match res {
            Ok(()) => Event::new(EventKind::Substantiated),
            Err(e) => Event::new(EventKind::SubstantiationFailed).with_reason(e.to_string()),
        };
        self.inner.bus.publish(ev.with_subject(self.name_arc()));
    }

    /// Cancels an in-flight boot. Every caller waiting on it gets
    /// [`SubstantiationError::Cancelled`].
    ///
    /// Returns `false` if nothing was booting.
    pub fn cancel_substantiation(&self) -> bool {
        let boot = self.lock().boot.take();
        match boot {
            Some(boot) => {
                boot.cancel.cancel();
                self.inner.bus.publish(
                    Event::new(EventKind::SubstantiationFailed)
                        .with_subject(self.name_arc())
                        .with_reason(SubstantiationError::Cancelled.to_string()),
                );
                true
            }
            None => false,
        }
    }

    /// Stops the latent instance (cancelling a boot in flight).
    ///
    /// Every registered pairing falls back to LATENT, so the next build boots
    /// a fresh instance.
    pub async fn insubstantiate(&self) {
        let Some(driver) = self.inner.driver.clone() else {
            return;
        };
        self.cancel_substantiation();
        let (was_up, watchers) = {
            let mut st = self.lock();
            let watchers: Vec<_> = st.builders.iter().filter_map(|r| r.watcher.upgrade()).collect();
            (std::mem::replace(&mut st.substantiated, false), watchers)
        };
        for watcher in watchers {
            watcher.instance_stopped();
        }
        if was_up {
            driver.stop_instance().await;
            self.inner
                .bus
                .publish(Event::new(EventKind::Insubstantiated).with_subject(self.name_arc()));
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.inner.name)
            .field("latent", &self.is_latent())
            .field("running", &self.running_builds())
            .finish()
    }
}
