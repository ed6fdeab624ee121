//! # Example: graceful_shutdown
//!
//! Runs a few builds on two workers and drains them with a graceful shutdown,
//! printing every runtime event with the built-in [`LogWriter`].
//!
//! Shows how to:
//! - Implement [`BuildRunner`] and [`Connection`].
//! - Pair a builder with workers and attach them.
//! - Watch a graceful drain: waited-for requests still start, the rest stay queued.
//!
//! ## Flow
//! ```text
//! submit(1..=4) ──► distributor round ──► w0, w1 busy (requests 1, 2)
//! clean_shutdown(Graceful)
//!     ├─► admission = WaitedForOnly
//!     ├─► build 1 finishes ──► request 3 (waited for) starts
//!     └─► every build done ──► ShutdownComplete (request 4 still queued)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example graceful_shutdown --features logging
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use buildmaster::{
    BotMasterBuilder, BuildRequest, BuildResult, BuildRunner, Config, Connection,
    ConnectionError, LogWriter, RemoteCommands, RunningBuild, ShutdownMode, Subscribe, Worker,
};

/// Pretends to compile for a while.
struct SleepyRunner;

#[async_trait]
impl BuildRunner for SleepyRunner {
    async fn run_build(&self, build: &RunningBuild) -> BuildResult {
        tokio::time::sleep(Duration::from_millis(200 * build.request().id)).await;
        BuildResult::Success
    }
}

/// In-process stand-in for a worker connection.
struct LocalWorker;

#[async_trait]
impl Connection for LocalWorker {
    async fn remote_print(&self, _message: &str) -> Result<(), ConnectionError> {
        Ok(())
    }

    fn lose_connection(&self) {}
}

#[tokio::main]
async fn main() {
    let cfg = Config {
        max_builds: 1,
        ..Config::default()
    };
    let bm = BotMasterBuilder::new(cfg)
        .with_subscribers(vec![Arc::new(LogWriter::new()) as Arc<dyn Subscribe>])
        .build();

    for name in ["w0", "w1"] {
        bm.add_worker(Worker::new(name, bm.config(), bm.bus().clone()));
    }
    let linux = bm.add_builder("linux", Arc::new(SleepyRunner), &["w0", "w1"]);
    for name in ["w0", "w1"] {
        if let Err(e) = bm.worker_attached(name, Arc::new(LocalWorker), RemoteCommands::new()) {
            eprintln!("attach {name} failed: {e}");
            return;
        }
    }

    linux.submit(BuildRequest::new(1));
    linux.submit(BuildRequest::new(2));
    linux.submit(BuildRequest::new(3).waited_for(true));
    linux.submit(BuildRequest::new(4));
    bm.distributor().when_quiet().await;

    let outcome = bm.clean_shutdown(ShutdownMode::Graceful).await;
    println!("shutdown: {outcome:?}");
    println!(
        "still queued: {:?}",
        linux.pending_requests().iter().map(|r| r.id).collect::<Vec<_>>()
    );

    bm.close().await;
}
