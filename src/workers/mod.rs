//! Worker dispatch: per-builder worker state machine and the worker pool.
//!
//! - [`WorkerState`] / [`Transition`]: closed state set and its transition table;
//! - [`Worker`]: pool-level bookkeeping shared by builders (build cap, latent instance);
//! - [`WorkerForBuilder`]: one worker seen by one builder, with coalesced ping;
//! - [`Connection`]: transport seam used for pings and connection teardown;
//! - [`LatentDriver`]: backend that boots on-demand instances.

mod conn;
mod for_builder;
mod state;
mod worker;

pub use conn::{Connection, ConnectionRef, RemoteCommands};
pub use for_builder::WorkerForBuilder;
pub use state::{Transition, WorkerState};
pub use worker::{LatentDriver, Worker};

#[cfg(test)]
pub(crate) use for_builder::testing::MockConnection;
#[cfg(test)]
pub(crate) use worker::testing::MockDriver;
