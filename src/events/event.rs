//! # Runtime events emitted by loops, workers, builders and the botmaster.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Loop events**: round execution, wake-ups, quiescence, processor failures
//! - **Worker events**: attach/detach, ping, substantiation
//! - **Build events**: start, finish, forced stop, requeue
//! - **Shutdown events**: clean shutdown progress
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! subject name, reasons, delays, build numbers and results.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use buildmaster::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WakeScheduled)
//!     .with_subject("distributor")
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(ev.kind, EventKind::WakeScheduled);
//! assert_eq!(ev.subject.as_deref(), Some("distributor"));
//! assert_eq!(ev.delay_ms, Some(250));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::master::BuildResult;
use crate::workers::WorkerState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `subject` (subscriber name), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `subject` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Loop events ===
    /// A round over all processors is starting.
    ///
    /// Sets: `subject` (loop name), `attempt` (round number within the cascade).
    RoundStarted,

    /// A round finished; every processor has exited.
    ///
    /// Sets: `subject` (loop name), `attempt` (round number within the cascade).
    RoundFinished,

    /// The loop became quiet: no round running and none pending.
    ///
    /// Published exactly once per quiescence, not once per round.
    ///
    /// Sets: `subject` (loop name).
    LoopQuiet,

    /// A deferred re-trigger was scheduled on behalf of a processor.
    ///
    /// Sets: `subject` (loop name), `delay_ms` (effective delay after the floor).
    WakeScheduled,

    /// A processor failed or panicked; the round continued.
    ///
    /// Sets: `subject` (processor name), `reason` (error text).
    ProcessorFailed,

    /// A service container started.
    ///
    /// Sets: `subject` (service name).
    ServiceStarted,

    /// A service container stopped.
    ///
    /// Sets: `subject` (service name).
    ServiceStopped,

    // === Worker events ===
    /// A worker-builder completed its attach handshake.
    ///
    /// Sets: `subject` (worker name), `builder`, `state`.
    WorkerAttached,

    /// A worker-builder lost its connection.
    ///
    /// Sets: `subject` (worker name), `builder`, `state`.
    WorkerDetached,

    /// A wire-level ping was sent.
    ///
    /// Sets: `subject` (worker name), `builder`.
    PingSent,

    /// A ping failed; the connection was dropped.
    ///
    /// Sets: `subject` (worker name), `builder`, `reason`.
    PingFailed,

    /// A latent worker started booting.
    ///
    /// Sets: `subject` (worker name).
    SubstantiationStarted,

    /// A latent worker is up.
    ///
    /// Sets: `subject` (worker name).
    Substantiated,

    /// A latent worker failed to boot (or the boot was cancelled).
    ///
    /// Sets: `subject` (worker name), `reason`.
    SubstantiationFailed,

    /// A latent worker instance was shut down.
    ///
    /// Sets: `subject` (worker name).
    Insubstantiated,

    // === Build events ===
    /// A build was assigned to a worker.
    ///
    /// Sets: `subject` (worker name), `builder`, `build`.
    BuildStarted,

    /// A build finished.
    ///
    /// Sets: `subject` (worker name), `builder`, `build`, `result`.
    BuildFinished,

    /// A running build was forcibly stopped.
    ///
    /// Sets: `builder`, `build`, `result` (RETRY/CANCELLED), `reason`.
    BuildStopped,

    /// A request was put back in the queue after a RETRY result.
    ///
    /// Sets: `builder`, `reason`.
    BuildRequeued,

    // === Shutdown events ===
    /// A termination signal reached the process.
    ///
    /// Sets: `reason` (signal name, e.g. "SIGTERM").
    SignalReceived,

    /// Clean shutdown initiated.
    ///
    /// Sets: `reason` ("graceful" / "quick").
    ShutdownRequested,

    /// Shutdown is waiting for running builds.
    ///
    /// Sets: `attempt` (number of builds being waited for).
    ShutdownWaiting,

    /// A pending graceful shutdown was cancelled.
    ShutdownCancelled,

    /// Shutdown completed; the process stopper was invoked.
    ShutdownComplete,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the loop, processor, worker or subscriber the event is about.
    pub subject: Option<Arc<str>>,
    /// Builder name, if applicable.
    pub builder: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Round number or counter.
    pub attempt: Option<u32>,
    /// Build number, if applicable.
    pub build: Option<u64>,
    /// Build result, if applicable.
    pub result: Option<BuildResult>,
    /// Worker-builder state after the change, if applicable.
    pub state: Option<WorkerState>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            subject: None,
            builder: None,
            reason: None,
            delay_ms: None,
            attempt: None,
            build: None,
            result: None,
            state: None,
        }
    }

    /// Attaches the subject name.
    #[inline]
    pub fn with_subject(mut self, subject: impl Into<Arc<str>>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attaches a builder name.
    #[inline]
    pub fn with_builder(mut self, builder: impl Into<Arc<str>>) -> Self {
        self.builder = Some(builder.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a counter (round number, number of builds, ...).
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a build number.
    #[inline]
    pub fn with_build(mut self, number: u64) -> Self {
        self.build = Some(number);
        self
    }

    /// Attaches a build result.
    #[inline]
    pub fn with_result(mut self, result: BuildResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Attaches a worker-builder state.
    #[inline]
    pub fn with_state(mut self, state: WorkerState) -> Self {
        self.state = Some(state);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_subject(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_subject(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::RoundStarted);
        let b = Event::new(EventKind::RoundFinished);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_is_clamped_to_u32_millis() {
        let ev = Event::new(EventKind::WakeScheduled).with_delay(Duration::from_secs(u64::MAX / 4));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn overflow_event_names_subscriber() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.subject.as_deref(), Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}
