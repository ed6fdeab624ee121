//! # Processor abstraction and function-backed processor.
//!
//! A [`Processor`] is a unit of asynchronous work serviced once per round by a
//! loop. It returns an optional wake-up instant: `Some(at)` asks the loop to run
//! another round no later than `at` (subject to the minimum delay floor),
//! `None` means "don't care".
//!
//! [`ProcessorFn`] wraps a closure `F: Fn() -> Fut`, producing a fresh future
//! per round. If shared state is needed, capture an `Arc<...>` explicitly.
//!
//! ## Example
//! ```rust
//! use buildmaster::{ProcessorError, ProcessorFn, ProcessorRef};
//!
//! let p: ProcessorRef = ProcessorFn::arc("collapse-requests", || async {
//!     // merge duplicate build requests...
//!     Ok::<_, ProcessorError>(None)
//! });
//! assert_eq!(p.name(), "collapse-requests");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::ProcessorError;

/// Outcome of one processor invocation: an optional wake-up request.
pub type Wake = Option<Instant>;

/// Shared handle to a processor.
pub type ProcessorRef = Arc<dyn Processor>;

/// # Asynchronous unit of work serviced once per round.
///
/// Implementations must eventually complete: a processor that never returns
/// stalls every later round of its loop. Processors own their timeouts.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    /// Returns a stable, human-readable processor name.
    fn name(&self) -> &str;

    /// Runs one unit of work.
    ///
    /// Must not assume any invocation order relative to sibling processors.
    async fn process(&self) -> Result<Wake, ProcessorError>;
}

/// Function-backed processor implementation.
#[derive(Debug)]
pub struct ProcessorFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ProcessorFn<F> {
    /// Creates a new function-backed processor.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the processor and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Processor for ProcessorFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Wake, ProcessorError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self) -> Result<Wake, ProcessorError> {
        (self.f)().await
    }
}
