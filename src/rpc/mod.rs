//! RPC server for client communication.
//!
//! Provides a JSON-RPC 2.0 interface over TCP for the download engine: queue
//! and history reads, history mutation, download submission, and filesystem
//! queries.
//!
//! ## Architecture
//!
//! - `protocol`: JSON-RPC 2.0 request/response types and method names
//! - `transport`: TCP listener with newline-delimited JSON framing
//! - `methods`: Method dispatcher and handlers
//! - `client`: Client for connecting to the daemon
//!
//! ## Push notifications
//!
//! A client calling `queue.subscribe` keeps its connection open and receives a
//! `queue_changed` notification after every queue mutation.

pub mod client;
pub mod methods;
mod protocol;
mod transport;

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use transport::Transport;

pub use client::{ClientError, RpcClient};
pub use methods::MethodHandler;
pub use protocol::{Incoming, Request, Response, RpcError, method};

/// RPC server that exposes daemon functionality to clients.
pub struct RpcServer {
    transport: Transport,
}

impl RpcServer {
    /// Bind the server to the given address. Port 0 picks a free port.
    pub async fn bind(ctx: AppContext, bind_addr: SocketAddr) -> anyhow::Result<Self> {
        let handler = MethodHandler::new(ctx)?;
        let transport = Transport::bind(bind_addr, handler).await?;
        Ok(Self { transport })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Serve requests until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        self.transport.listen(shutdown).await
    }
}
