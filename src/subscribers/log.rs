//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for test or demo.
//!
//! ## Example output
//! ```text
//! [round-started] loop="distributor" round=1
//! [processor-failed] processor="linux-builder" err="db down"
//! [loop-quiet] loop="distributor"
//! [ping-failed] worker="w1" builder="linux-builder" err="connection lost"
//! [build-finished] worker="w1" builder="linux-builder" build=7 result=Success
//! [shutdown-requested] mode="graceful"
//! [shutdown-complete]
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let subject = e.subject.as_deref().unwrap_or("-");
        let builder = e.builder.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::RoundStarted => {
                println!("[round-started] loop={subject:?} round={:?}", e.attempt);
            }
            EventKind::RoundFinished => {
                println!("[round-finished] loop={subject:?} round={:?}", e.attempt);
            }
            EventKind::LoopQuiet => println!("[loop-quiet] loop={subject:?}"),
            EventKind::WakeScheduled => {
                println!("[wake-scheduled] loop={subject:?} delay_ms={:?}", e.delay_ms);
            }
            EventKind::ProcessorFailed => {
                println!("[processor-failed] processor={subject:?} err={reason:?}");
            }
            EventKind::ServiceStarted => println!("[service-started] service={subject:?}"),
            EventKind::ServiceStopped => println!("[service-stopped] service={subject:?}"),
            EventKind::WorkerAttached | EventKind::WorkerDetached => {
                let tag = if e.kind == EventKind::WorkerAttached {
                    "attached"
                } else {
                    "detached"
                };
                println!(
                    "[worker-{tag}] worker={subject:?} builder={builder:?} state={:?}",
                    e.state
                );
            }
            EventKind::PingSent => println!("[ping-sent] worker={subject:?} builder={builder:?}"),
            EventKind::PingFailed => {
                println!("[ping-failed] worker={subject:?} builder={builder:?} err={reason:?}");
            }
            EventKind::SubstantiationStarted => {
                println!("[substantiating] worker={subject:?}");
            }
            EventKind::Substantiated => println!("[substantiated] worker={subject:?}"),
            EventKind::SubstantiationFailed => {
                println!("[substantiation-failed] worker={subject:?} err={reason:?}");
            }
            EventKind::Insubstantiated => println!("[insubstantiated] worker={subject:?}"),
            EventKind::BuildStarted => {
                println!(
                    "[build-started] worker={subject:?} builder={builder:?} build={:?}",
                    e.build
                );
            }
            EventKind::BuildFinished => {
                println!(
                    "[build-finished] worker={subject:?} builder={builder:?} build={:?} result={:?}",
                    e.build, e.result
                );
            }
            EventKind::BuildStopped => {
                println!(
                    "[build-stopped] builder={builder:?} build={:?} result={:?} reason={reason:?}",
                    e.build, e.result
                );
            }
            EventKind::BuildRequeued => {
                println!("[build-requeued] builder={builder:?} reason={reason:?}");
            }
            EventKind::SignalReceived => println!("[signal] {reason:?}"),
            EventKind::ShutdownRequested => println!("[shutdown-requested] mode={reason:?}"),
            EventKind::ShutdownWaiting => {
                println!("[shutdown-waiting] builds={:?}", e.attempt);
            }
            EventKind::ShutdownCancelled => println!("[shutdown-cancelled]"),
            EventKind::ShutdownComplete => println!("[shutdown-complete]"),
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] subscriber={subject:?} reason={reason:?}");
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] subscriber={subject} info={reason}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
