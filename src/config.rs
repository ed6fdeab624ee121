//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the build master core.
//!
//! Config is used in three places:
//! 1. **Loops**: `Loop::new(name, &config, bus)` reads the minimum wake-up delay
//! 2. **Workers**: `Worker::new(name, &config, bus)` reads ping/substantiation limits
//! 3. **BotMaster**: `BotMasterBuilder::new(config)` sizes the event bus
//!
//! ## Sentinel values
//! - `max_builds = 0` → unlimited concurrent builds per worker
//! - `ping_timeout = 0s` → no ping timeout (the transport reports connection loss)
//! - `substantiation_timeout = 0s` → latent workers may take forever to boot

use std::time::Duration;

/// Global configuration for the build master core.
///
/// ## Field semantics
/// - `ocd_minimum_delay`: Floor applied to processor-requested wake-ups
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `ping_timeout`: Maximum wait for a wire ping (`0s` = no limit)
/// - `substantiation_timeout`: Maximum wait for a latent worker to boot (`0s` = no limit)
/// - `max_builds`: Default per-worker build cap (`0` = unlimited)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Minimum delay before a processor-requested wake-up round.
    ///
    /// A processor that asks to be revisited "very soon" is revisited no sooner
    /// than this, collapsing tight wake-up requests into a coarser granularity.
    pub ocd_minimum_delay: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Maximum time to wait for a worker to answer a ping.
    ///
    /// An expired ping counts as a failed one: the connection is dropped.
    pub ping_timeout: Duration,

    /// Maximum time to wait for a latent worker instance to come up.
    pub substantiation_timeout: Duration,

    /// Default number of builds a worker may run at once (`0` = unlimited).
    pub max_builds: usize,
}

impl Config {
    /// Returns the ping timeout as an `Option`.
    #[inline]
    pub fn ping_limit(&self) -> Option<Duration> {
        if self.ping_timeout == Duration::ZERO {
            None
        } else {
            Some(self.ping_timeout)
        }
    }

    /// Returns the substantiation timeout as an `Option`.
    #[inline]
    pub fn substantiation_limit(&self) -> Option<Duration> {
        if self.substantiation_timeout == Duration::ZERO {
            None
        } else {
            Some(self.substantiation_timeout)
        }
    }

    /// Returns the per-worker build cap as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` concurrent builds
    #[inline]
    pub fn build_limit(&self) -> Option<usize> {
        if self.max_builds == 0 {
            None
        } else {
            Some(self.max_builds)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `ocd_minimum_delay = 100ms`
    /// - `bus_capacity = 1024`
    /// - `ping_timeout = 0s` (no timeout)
    /// - `substantiation_timeout = 20min`
    /// - `max_builds = 0` (unlimited)
    fn default() -> Self {
        Self {
            ocd_minimum_delay: Duration::from_millis(100),
            bus_capacity: 1024,
            ping_timeout: Duration::ZERO,
            substantiation_timeout: Duration::from_secs(20 * 60),
            max_builds: 0,
        }
    }
}
