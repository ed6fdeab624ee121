use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

use super::botmaster::{BotMaster, Stopper};

/// Stopper that does nothing; the host stops itself once
/// `clean_shutdown` reports completion.
struct NoopStopper;

#[async_trait]
impl Stopper for NoopStopper {
    async fn stop(&self) {}
}

/// Builder for constructing a [`BotMaster`] with optional features.
pub struct BotMasterBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    stopper: Arc<dyn Stopper>,
}

impl BotMasterBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            stopper: Arc::new(NoopStopper),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (rounds, pings, builds, shutdown)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets what a completed clean shutdown stops.
    pub fn with_stopper(mut self, stopper: Arc<dyn Stopper>) -> Self {
        self.stopper = stopper;
        self
    }

    /// Builds and returns the BotMaster instance.
    ///
    /// Initializes the event bus, the subscriber workers, the distributor and
    /// the bus listener. Must be called from within a tokio runtime.
    pub fn build(self) -> BotMaster {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        BotMaster::new_internal(self.cfg, bus, subs, self.stopper)
    }
}
