//! RPC client for connecting to the daemon.
//!
//! Provides a simple client for sending JSON-RPC requests to the daemon and
//! for holding a long-lived subscription that receives push notifications.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::protocol::{Incoming, Request, Response, RpcError};

/// Pending notifications a subscriber may hold before further ones are coalesced.
const NOTIFICATION_BUFFER: usize = 16;

/// RPC client for communicating with the daemon.
pub struct RpcClient {
    addr: SocketAddr,
    next_id: AtomicU64,
}

/// Error returned by RPC client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to connect to daemon: {0}")]
    Connect(#[source] std::io::Error),
    #[error("Communication error: {0}")]
    Io(#[source] std::io::Error),
    #[error("Failed to serialize request: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Failed to parse response: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Daemon closed the connection")]
    Closed,
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(RpcError),
}

impl RpcClient {
    /// Create a new client that will connect to the given address.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            next_id: AtomicU64::new(1),
        }
    }

    /// Call an RPC method and return the result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, ClientError> {
        let (_reader, _writer, result) = self.open(method, params).await?;
        serde_json::from_value(result).map_err(ClientError::Parse)
    }

    /// Call an RPC method with no parameters.
    pub async fn call_no_params<T: DeserializeOwned>(
        &self,
        method: &str,
    ) -> Result<T, ClientError> {
        self.call(method, None).await
    }

    /// Issue a subscribe call and keep the connection open.
    ///
    /// Every pushed notification named `notification` is forwarded as a unit
    /// message. When the receiver is full the notification is dropped, since a
    /// pending one already signals the same thing. The returned task ends when
    /// the daemon closes the connection; abort it to unsubscribe.
    pub async fn subscribe(
        &self,
        method: &str,
        notification: &str,
    ) -> Result<(mpsc::Receiver<()>, JoinHandle<()>), ClientError> {
        let (mut reader, writer, _ack) = self.open(method, None).await?;
        let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);
        let notification = notification.to_string();
        let addr = self.addr;

        let handle = tokio::spawn(async move {
            // Dropping the write half would shut the socket down and end the
            // subscription on the daemon side.
            let _writer = writer;
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(addr = %addr, "Subscription closed by daemon");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(addr = %addr, error = %e, "Subscription read failed");
                        break;
                    }
                }

                match serde_json::from_str::<Incoming>(line.trim()) {
                    Ok(Incoming::Notification(n)) if n.method == notification => {
                        if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(()) {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "Ignoring malformed push"),
                }
            }
        });

        Ok((rx, handle))
    }

    /// Send one request and read its response, returning the still-open halves.
    async fn open(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf, Value), ClientError> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(ClientError::Connect)?;
        let (read_half, mut write_half) = stream.into_split();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(method, params, id);

        let mut request_json = serde_json::to_string(&request).map_err(ClientError::Serialize)?;
        request_json.push('\n');

        write_half
            .write_all(request_json.as_bytes())
            .await
            .map_err(ClientError::Io)?;

        let mut reader = BufReader::new(read_half);
        let mut response_line = String::new();
        let read = reader
            .read_line(&mut response_line)
            .await
            .map_err(ClientError::Io)?;
        if read == 0 {
            return Err(ClientError::Closed);
        }

        let response: Response =
            serde_json::from_str(&response_line).map_err(ClientError::Parse)?;

        if let Some(error) = response.error {
            return Err(ClientError::Rpc(error));
        }

        Ok((reader, write_half, response.result.unwrap_or(Value::Null)))
    }
}
