//! Transport seam between the worker state machine and the wire protocol.
//!
//! The connection-management layer owns sockets and handshakes; the core only
//! needs to check liveness and to drop a connection it no longer trusts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ConnectionError;

/// Remote command name → version string, as reported at attach time.
///
/// Opaque to the core.
pub type RemoteCommands = HashMap<String, String>;

/// Live connection to a remote worker process.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Asks the worker to print `message` and waits for the acknowledgement.
    ///
    /// Used as the wire-level ping.
    async fn remote_print(&self, message: &str) -> Result<(), ConnectionError>;

    /// Tears the connection down. The transport reports the loss back through
    /// `detached()` once it is gone.
    fn lose_connection(&self);
}

/// Shared handle to a connection.
pub type ConnectionRef = Arc<dyn Connection>;
