//! # Event subscribers for the build master.
//!
//! This module provides the [`Subscribe`] trait, the fan-out [`SubscriberSet`]
//! and (with feature `logging`) the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Loop / Worker / Builder ── publish(Event) ──► Bus ──► BotMaster listener
//!                                                            │
//!                                                  SubscriberSet::emit(&Event)
//!                                                  ┌─────────┼─────────┐
//!                                                  ▼         ▼         ▼
//!                                              LogWriter  Metrics   Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use buildmaster::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailedPings;
//!
//! #[async_trait]
//! impl Subscribe for FailedPings {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::PingFailed {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failed-pings" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
