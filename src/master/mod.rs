//! Build distribution and clean shutdown.
//!
//! - [`Builder`]: request queue plus worker pairings; starts builds;
//! - [`BuildRequestDistributor`]: delegate loop over builders with pending work;
//! - [`RunningBuild`] / [`BuildRunner`]: a build in progress and the seam that runs it;
//! - [`BotMaster`]: owns everything above and coordinates clean shutdown;
//! - [`BotMasterBuilder`]: wires the bus, subscribers and stopper.

mod botmaster;
mod build;
mod builder;
mod distributor;
mod request;
mod results;
mod setup;
mod signals;

#[cfg(test)]
pub(crate) mod testing;

pub use botmaster::{BotMaster, ShutdownMode, ShutdownOutcome, Stopper};
pub use build::{BuildRunner, RunningBuild, RunningBuildRef};
pub use builder::Builder;
pub use distributor::{Admission, BuildRequestDistributor};
pub use request::BuildRequest;
pub use results::{BuildResult, classify_stopped_build};
pub use setup::BotMasterBuilder;
pub use signals::{ShutdownSignal, wait_for_shutdown_signal};
