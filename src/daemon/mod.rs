//! Reference download engine.
//!
//! Owns the authoritative queue and history, runs downloads through a
//! [`Fetcher`], and serves both over the RPC interface.

pub mod fetcher;
pub mod files;
pub mod queue;
mod worker;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::context::AppContext;
use crate::rpc::RpcServer;

pub use fetcher::{FetchRequest, Fetcher, SimulatedFetcher};
pub use queue::QueueManager;
pub use worker::Worker;

pub struct Daemon {
    ctx: AppContext,
    fetcher: Arc<dyn Fetcher>,
}

/// Running daemon. Dropping it leaves the tasks running; call [`shutdown`].
///
/// [`shutdown`]: DaemonHandle::shutdown
pub struct DaemonHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl Daemon {
    pub fn new(ctx: AppContext, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { ctx, fetcher }
    }

    /// Bind the RPC server and start the download worker.
    pub async fn start(self) -> Result<DaemonHandle> {
        let download_dir = &self.ctx.config.download_directory;
        tokio::fs::create_dir_all(download_dir)
            .await
            .with_context(|| format!("Failed to create {}", download_dir.display()))?;

        let server = RpcServer::bind(self.ctx.clone(), self.ctx.config.rpc_bind)
            .await
            .with_context(|| format!("Failed to bind {}", self.ctx.config.rpc_bind))?;
        let local_addr = server.local_addr()?;

        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();

        let token = shutdown.clone();
        tasks.spawn(async move {
            if let Err(e) = server.run(token).await {
                error!(error = %e, "RPC server stopped");
            }
        });
        tasks.spawn(Worker::new(self.ctx.clone(), self.fetcher).run(shutdown.clone()));
        tasks.close();

        info!(addr = %local_addr, dir = %download_dir.display(), "Engine daemon started");

        Ok(DaemonHandle {
            local_addr,
            shutdown,
            tasks,
        })
    }
}

impl DaemonHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting work and wait for the tasks to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.tasks.wait().await;
        info!("Engine daemon stopped");
    }
}
