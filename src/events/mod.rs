//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the loops, the worker-builder state
//! machine, builders and the shutdown coordinator.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: loop engine (rounds, wake-ups, processor failures),
//!   `WorkerForBuilder` / `Worker` (attach, ping, substantiation), `Builder`
//!   (build start/finish/requeue), `BotMaster` (shutdown), `SubscriberSet`.
//! - **Consumers**: the `BotMaster` listener (fans out to `SubscriberSet`) and
//!   anything holding a receiver from [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
