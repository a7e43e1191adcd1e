//! TCP transport layer for the RPC server.
//!
//! Handles TCP connections with newline-delimited JSON framing.
//! Each connection is handled in its own task. A connection that calls
//! `queue.subscribe` stops taking requests and receives `queue_changed`
//! notifications until either side hangs up.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::methods::MethodHandler;
use super::protocol::{Request, Response, method};

/// Manages the TCP transport layer.
pub struct Transport {
    listener: TcpListener,
    handler: Arc<MethodHandler>,
}

impl Transport {
    pub async fn bind(bind_addr: SocketAddr, handler: MethodHandler) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self {
            listener,
            handler: Arc::new(handler),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn listen(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(addr = %self.local_addr()?, "RPC server listening");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "Client connected");
                            let handler = self.handler.clone();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, handler, shutdown).await {
                                    debug!(peer = %peer_addr, error = %e, "Connection error");
                                }
                                debug!(peer = %peer_addr, "Client disconnected");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("RPC server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handle a single client connection.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<MethodHandler>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            // EOF - client disconnected
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => {
                // Validate JSON-RPC 2.0 format
                if let Err(msg) = request.validate() {
                    warn!(peer = %peer_addr, error = msg, "Invalid request");
                    let id = request.id.clone().unwrap_or(serde_json::Value::Null);
                    Response::invalid_request(id)
                } else if request.is_notification() {
                    // Notifications don't get responses
                    debug!(peer = %peer_addr, method = %request.method, "Notification received");
                    handler.handle(request).await;
                    continue;
                } else if request.method == method::QUEUE_SUBSCRIBE {
                    // Subscribe before acknowledging so no change is missed
                    let changes = handler.subscribe_changes();
                    let ack = handler.handle(request).await;
                    write_line(&mut writer, &ack).await?;
                    debug!(peer = %peer_addr, "Client subscribed to queue changes");
                    return push_changes(reader, writer, changes, shutdown).await;
                } else {
                    // Normal request
                    handler.handle(request).await
                }
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "Parse error");
                Response::parse_error()
            }
        };

        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

/// Forward queue change signals to a subscribed client.
async fn push_changes(
    mut reader: BufReader<OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
    mut changes: broadcast::Receiver<()>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let notification = Request::notification(method::QUEUE_CHANGED);
    let mut discard = String::new();

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                // A lagging subscriber still needs one signal; the refresh it
                // triggers covers every missed change.
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    write_line(&mut writer, &notification).await?;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            read = reader.read_line(&mut discard) => {
                // Subscribers only listen; anything but EOF is ignored
                if read? == 0 {
                    break;
                }
                discard.clear();
            }
            _ = shutdown.cancelled() => break,
        }
    }

    Ok(())
}

async fn write_line<T: serde::Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    Ok(())
}
