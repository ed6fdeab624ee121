//! # buildmaster
//!
//! **buildmaster** is the scheduling core of a continuous-integration build
//! master: coalescing processor loops, the per-builder worker state machine
//! and clean shutdown coordination.
//!
//! Everything around it (VCS pollers, web hooks, reporters, databases, cloud
//! drivers) is a collaborator that calls into the core through narrow seams:
//! [`Processor`], [`Connection`], [`LatentDriver`], [`BuildRunner`] and
//! [`Stopper`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   submit(BuildRequest)        attached()/detached()         clean_shutdown()
//!          │                           │                             │
//!          ▼                           ▼                             ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │  BotMaster                                                                │
//! │  - Bus (broadcast events)                                                 │
//! │  - SubscriberSet (fans out to user subscribers)                           │
//! │  - BuildRequestDistributor (DelegateLoop over builders with work)         │
//! │  - Builders ──► WorkerForBuilder ──► Worker (build cap, latent instance)  │
//! └──────┬──────────────────┬──────────────────┬─────────────────┬────────────┘
//!        ▼                  ▼                  ▼                 │
//!   Loop engine        WorkerForBuilder     Builder              │
//!   - RoundStarted     - WorkerAttached     - BuildStarted       │
//!   - LoopQuiet        - PingFailed         - BuildFinished      │
//!   - WakeScheduled    - Substantiated      - BuildRequeued      │
//!        │                  │                  │                 │
//!        ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                       Bus (broadcast channel)                             │
//! │                 (capacity: Config::bus_capacity)                          │
//! └────────────────────────────────┬──────────────────────────────────────────┘
//!                                  ▼
//!                      ┌───────────────────────┐
//!                      │  subscriber_listener  │
//!                      │    (in BotMaster)     │
//!                      └───────────┬───────────┘
//!                                  ▼
//!                            SubscriberSet
//!                        (per-sub bounded queues)
//!                        ┌─────────┼─────────┐
//!                        ▼         ▼         ▼
//!                     sub1.on   sub2.on   subN.on
//!                     _event()  _event()  _event()
//! ```
//!
//! ### Rounds
//! ```text
//! trigger() × N ──► one round ──► every processor, one at a time
//!                        │
//!                        ├─ re-triggered during the round ─► another full round
//!                        ├─ wake requested ─► timer at max(ocd_minimum_delay, wake - now)
//!                        └─ otherwise ─► quiet: LoopQuiet, when_quiet() waiters resolve
//! ```
//!
//! ## Features
//! | Area               | Description                                                  | Key types / traits                                  |
//! |--------------------|--------------------------------------------------------------|-----------------------------------------------------|
//! | **Loops**          | Coalesced, single-file rounds over processors.               | [`Loop`], [`DelegateLoop`], [`MultiServiceLoop`]    |
//! | **Workers**        | Worker-builder state machine, ping coalescing, latent boot.  | [`WorkerForBuilder`], [`Worker`], [`WorkerState`]   |
//! | **Distribution**   | Match queued requests with available workers.                | [`Builder`], [`BuildRequestDistributor`]            |
//! | **Shutdown**       | Graceful / quick / cancellable clean shutdown.               | [`BotMaster`], [`ShutdownMode`]                     |
//! | **Subscriber API** | Hook into runtime events (logging, metrics, custom).         | [`Subscribe`]                                       |
//! | **Errors**         | Typed errors with stable labels.                             | [`WorkerError`], [`SubstantiationError`]            |
//! | **Configuration**  | Centralize runtime settings.                                 | [`Config`]                                          |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use buildmaster::{
//!     BotMasterBuilder, BuildRequest, BuildResult, BuildRunner, Config, Connection,
//!     ConnectionError, RemoteCommands, RunningBuild, ShutdownMode, ShutdownOutcome, Worker,
//! };
//!
//! struct Compile;
//!
//! #[async_trait]
//! impl BuildRunner for Compile {
//!     async fn run_build(&self, _build: &RunningBuild) -> BuildResult {
//!         BuildResult::Success
//!     }
//! }
//!
//! struct Loopback;
//!
//! #[async_trait]
//! impl Connection for Loopback {
//!     async fn remote_print(&self, _message: &str) -> Result<(), ConnectionError> {
//!         Ok(())
//!     }
//!     fn lose_connection(&self) {}
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bm = BotMasterBuilder::new(Config::default()).build();
//!     bm.add_worker(Worker::new("w1", bm.config(), bm.bus().clone()));
//!     let linux = bm.add_builder("linux", Arc::new(Compile), &["w1"]);
//!     bm.worker_attached("w1", Arc::new(Loopback), RemoteCommands::new())
//!         .expect("w1 is paired with linux");
//!
//!     linux.submit(BuildRequest::new(1));
//!     bm.distributor().when_quiet().await;
//!
//!     // Lets the running build finish, then stops.
//!     let outcome = bm.clean_shutdown(ShutdownMode::Graceful).await;
//!     assert_eq!(outcome, ShutdownOutcome::Completed);
//!     assert!(linux.pending_requests().is_empty());
//! }
//! ```
mod config;
mod error;
mod events;
mod master;
mod processing;
mod subscribers;
mod workers;

// ---- Public re-exports ----

pub use config::Config;
pub use error::{
    ConnectionError, ProcessorError, RuntimeError, ServiceError, SubstantiationError, WorkerError,
};
pub use events::{Bus, Event, EventKind};
pub use master::{
    Admission, BotMaster, BotMasterBuilder, BuildRequest, BuildRequestDistributor, BuildResult,
    BuildRunner, Builder, RunningBuild, RunningBuildRef, ShutdownMode, ShutdownOutcome,
    ShutdownSignal, Stopper, classify_stopped_build, wait_for_shutdown_signal,
};
pub use processing::{
    Clock, ClockRef, DelegateLoop, Loop, MultiServiceLoop, Processor, ProcessorFn, ProcessorRef,
    Service, ServiceRef, TokioClock, Trigger, Wake,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use workers::{
    Connection, ConnectionRef, LatentDriver, RemoteCommands, Transition, Worker, WorkerForBuilder,
    WorkerState,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
