//! RPC method handlers.
//!
//! Dispatches JSON-RPC method calls to the appropriate handler functions.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::core::{default_display_name, workshop};
use crate::daemon::files;
use crate::db;

use super::protocol::{Request, Response, method};

/// Handles RPC method dispatch and execution.
pub struct MethodHandler {
    ctx: AppContext,
    http: reqwest::Client,
    start_time: Instant,
}

#[derive(Deserialize)]
struct DownloadParams {
    content_id: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Deserialize)]
struct IdParams {
    id: String,
}

#[derive(Deserialize)]
struct PathParams {
    #[serde(default)]
    path: String,
}

#[derive(Serialize)]
struct Enqueued {
    id: String,
}

impl MethodHandler {
    pub fn new(ctx: AppContext) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(ctx.config.workshop_timeout_secs);
        let http = workshop::http_client(timeout)?;
        Ok(Self {
            ctx,
            http,
            start_time: Instant::now(),
        })
    }

    /// Receive a unit message after every queue mutation.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.ctx.queue.subscribe()
    }

    /// Handle an RPC request and return a response.
    pub async fn handle(&self, request: Request) -> Response {
        let id = request.id.clone().unwrap_or(Value::Null);
        let params = request.params.unwrap_or(Value::Null);

        match request.method.as_str() {
            method::ADD_DOWNLOAD => self.add_download(id, params, false).await,
            method::RETRY_DOWNLOAD => self.add_download(id, params, true).await,
            method::GET_QUEUE => Response::success(id, self.ctx.queue.snapshot().await),
            method::GET_HISTORY => self.get_history(id).await,
            method::REMOVE_HISTORY_ITEM => self.remove_history_item(id, params).await,
            method::CLEAR_HISTORY => self.clear_history(id).await,
            method::CHECK_PATH_EXISTS => self.check_path_exists(id, params).await,
            method::OPEN_FOLDER => self.open_folder(id, params).await,
            method::DAEMON_STATUS => self.daemon_status(id).await,
            // Push mode is set up by the transport; acknowledge only.
            method::QUEUE_SUBSCRIBE => Response::success(id, true),
            _ => Response::method_not_found(id, &request.method),
        }
    }

    /// Get daemon status/health information.
    async fn daemon_status(&self, id: Value) -> Response {
        #[derive(Serialize)]
        struct DaemonStatus {
            version: &'static str,
            uptime_secs: u64,
            queued: usize,
            rpc_bind: String,
        }

        Response::success(
            id,
            DaemonStatus {
                version: env!("CARGO_PKG_VERSION"),
                uptime_secs: self.start_time.elapsed().as_secs(),
                queued: self.ctx.queue.len().await,
                rpc_bind: self.ctx.config.rpc_bind.to_string(),
            },
        )
    }

    /// Queue a download, resolving workshop URLs to `app:file` ids first.
    async fn add_download(&self, id: Value, params: Value, retry: bool) -> Response {
        let params: DownloadParams = match parse_params(params) {
            Ok(p) => p,
            Err(resp) => return resp.with_id(id),
        };

        let input = params.content_id.trim();
        if input.is_empty() {
            return Response::invalid_params(id, "content_id must not be empty");
        }

        let mut content_id = input.to_string();
        let mut display_name = params.display_name.trim().to_string();
        if display_name.is_empty() {
            display_name = default_display_name(input);
        }

        if workshop::is_workshop_url(input) {
            match workshop::resolve(&self.http, input).await {
                Ok(item) => {
                    display_name = titled_name(display_name, input, item.title.clone());
                    content_id = item.content_id();
                }
                Err(e) => {
                    warn!(url = %content_id, error = %e, "Workshop lookup failed");
                    return Response::internal_error(id, e.to_string());
                }
            }
        }

        let job_id = self.ctx.queue.add(content_id.clone(), display_name).await;
        info!(job_id = %job_id, content_id = %content_id, retry, "Download queued");
        Response::success(id, Enqueued { id: job_id })
    }

    async fn get_history(&self, id: Value) -> Response {
        match db::history::list(&self.ctx.db).await {
            Ok(records) => Response::success(id, records),
            Err(e) => Response::internal_error(id, e.to_string()),
        }
    }

    async fn remove_history_item(&self, id: Value, params: Value) -> Response {
        let params: IdParams = match parse_params(params) {
            Ok(p) => p,
            Err(resp) => return resp.with_id(id),
        };

        let removed = match db::history::remove(&self.ctx.db, params.id).await {
            Ok(removed) => removed,
            Err(e) => return Response::internal_error(id, e.to_string()),
        };

        if let Some(record) = removed {
            info!(record_id = %record.id, "History record removed");
            if self.ctx.config.delete_files_on_remove {
                if let Err(e) = files::remove_install_dir(&record.install_path).await {
                    warn!(path = %record.install_path, error = %e, "Failed to delete install directory");
                }
            }
        }

        Response::success(id, ())
    }

    async fn clear_history(&self, id: Value) -> Response {
        match db::history::clear(&self.ctx.db).await {
            Ok(count) => {
                info!(count, "History cleared");
                Response::success(id, ())
            }
            Err(e) => Response::internal_error(id, e.to_string()),
        }
    }

    async fn check_path_exists(&self, id: Value, params: Value) -> Response {
        let params: PathParams = match parse_params(params) {
            Ok(p) => p,
            Err(resp) => return resp.with_id(id),
        };

        Response::success(id, files::path_exists(&params.path).await)
    }

    async fn open_folder(&self, id: Value, params: Value) -> Response {
        let params: PathParams = match parse_params(params) {
            Ok(p) => p,
            Err(resp) => return resp.with_id(id),
        };

        match files::open_folder(&params.path).await {
            Ok(()) => Response::success(id, ()),
            Err(e) => Response::internal_error(id, e.to_string()),
        }
    }
}

/// Replace a name synthesized from `input` with the workshop page title.
/// Names the operator typed are kept.
fn titled_name(display_name: String, input: &str, title: Option<String>) -> String {
    match title {
        Some(title) if display_name == default_display_name(input) => title,
        _ => display_name,
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, Response> {
    serde_json::from_value(params).map_err(|e| Response::invalid_params(Value::Null, e.to_string()))
}

impl Response {
    fn with_id(mut self, id: Value) -> Self {
        self.id = id;
        self
    }
}
