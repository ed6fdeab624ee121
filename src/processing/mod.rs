//! Coalescing processor loops.
//!
//! Three loop flavours share one round engine:
//! - [`Loop`]: explicitly registered processors, run in insertion order;
//! - [`DelegateLoop`]: processor set recomputed at the start of every round;
//! - [`MultiServiceLoop`]: processors are child [`Service`]s, rounds gated by start/stop.
//!
//! Internal modules:
//! - `engine`: trigger coalescing, single-file rounds, wake-up timer, quiescence;
//! - `processor`: the [`Processor`] trait and closure-backed [`ProcessorFn`];
//! - `clock`: injectable time source.

mod base;
mod clock;
mod delegate;
mod engine;
mod multi;
mod processor;

#[cfg(test)]
pub(crate) mod testing;

pub use base::Loop;
pub use clock::{Clock, ClockRef, TokioClock};
pub use delegate::DelegateLoop;
pub use engine::Trigger;
pub use multi::{MultiServiceLoop, Service, ServiceRef};
pub use processor::{Processor, ProcessorFn, ProcessorRef, Wake};
