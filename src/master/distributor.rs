//! # BuildRequestDistributor: matches queued requests with workers.
//!
//! A [`DelegateLoop`] whose accessor yields one processor per builder that
//! has admitted work. Builders trigger it on submit and when a build frees a
//! worker; the botmaster triggers it on worker attach.
//!
//! ## Admission
//! ```text
//! All            ── normal operation
//! WaitedForOnly  ── graceful shutdown drain: only requests someone waits on
//! Nothing        ── quick shutdown: distribution stopped
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::config::Config;
use crate::error::ProcessorError;
use crate::events::Bus;
use crate::processing::{DelegateLoop, Processor, ProcessorRef, Wake};

use super::builder::Builder;
use super::request::BuildRequest;

/// Which queued requests may be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Every request.
    All,
    /// Only requests somebody is explicitly waiting on.
    WaitedForOnly,
    /// None.
    Nothing,
}

impl Admission {
    /// True if `request` may be started under this admission.
    #[inline]
    pub fn admits(self, request: &BuildRequest) -> bool {
        match self {
            Admission::All => true,
            Admission::WaitedForOnly => request.waited_for,
            Admission::Nothing => false,
        }
    }
}

/// One builder's turn in a distribution round.
struct BuilderActivity {
    builder: Builder,
    admission: Admission,
}

#[async_trait]
impl Processor for BuilderActivity {
    fn name(&self) -> &str {
        self.builder.name()
    }

    async fn process(&self) -> Result<Wake, ProcessorError> {
        self.builder.maybe_start_builds(self.admission);
        Ok(None)
    }
}

/// Distributes build requests across builders. Clones share state.
#[derive(Clone)]
pub struct BuildRequestDistributor {
    lp: DelegateLoop,
    builders: Arc<Mutex<Vec<Builder>>>,
    admission: Arc<Mutex<Admission>>,
}

impl BuildRequestDistributor {
    /// Creates a running distributor with no builders.
    pub fn new(cfg: &Config, bus: Bus) -> Self {
        let builders: Arc<Mutex<Vec<Builder>>> = Arc::new(Mutex::new(Vec::new()));
        let admission = Arc::new(Mutex::new(Admission::All));

        let lp = {
            let builders = Arc::clone(&builders);
            let admission = Arc::clone(&admission);
            DelegateLoop::new("distributor", cfg, bus, move || {
                let admission = *admission.lock().unwrap_or_else(PoisonError::into_inner);
                builders
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .filter(|b| b.has_admitted(admission))
                    .map(|b| {
                        Arc::new(BuilderActivity {
                            builder: b.clone(),
                            admission,
                        }) as ProcessorRef
                    })
                    .collect()
            })
        };

        Self {
            lp,
            builders,
            admission,
        }
    }

    fn builders_lock(&self) -> MutexGuard<'_, Vec<Builder>> {
        self.builders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a builder; its submissions now trigger distribution.
    pub fn add_builder(&self, builder: &Builder) {
        builder.set_distributor(self.lp.trigger_handle());
        self.builders_lock().push(builder.clone());
        self.lp.trigger();
    }

    /// Registered builders.
    pub fn builders(&self) -> Vec<Builder> {
        self.builders_lock().clone()
    }

    /// Current admission.
    pub fn admission(&self) -> Admission {
        *self.admission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Changes the admission and runs a round under it.
    pub fn set_admission(&self, admission: Admission) {
        *self.admission.lock().unwrap_or_else(PoisonError::into_inner) = admission;
        self.lp.trigger();
    }

    /// Requests a distribution round.
    pub fn trigger(&self) {
        self.lp.trigger();
    }

    /// Stops distribution; waits for a round in progress.
    pub async fn stop(&self) {
        *self.admission.lock().unwrap_or_else(PoisonError::into_inner) = Admission::Nothing;
        self.lp.stop().await;
    }

    /// Restarts distribution with every request admitted.
    pub fn resume(&self) {
        *self.admission.lock().unwrap_or_else(PoisonError::into_inner) = Admission::All;
        self.lp.start();
        self.lp.trigger();
    }

    /// Resolves the next time no distribution round is running or pending.
    pub fn when_quiet(&self) -> impl Future<Output = ()> + Send + 'static {
        self.lp.when_quiet()
    }
}
