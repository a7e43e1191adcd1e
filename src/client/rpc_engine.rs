use std::net::SocketAddr;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::warn;

use super::engine::{ChangeFeed, Engine, EngineError};
use crate::core::{HistoryRecord, Job};
use crate::rpc::{RpcClient, method};

/// [`Engine`] backed by the daemon's JSON-RPC interface.
pub struct RpcEngine {
    client: RpcClient,
}

impl RpcEngine {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: RpcClient::new(addr),
        }
    }

    /// Fetch a list, skipping entries that do not parse.
    async fn list<T: DeserializeOwned>(&self, method: &str) -> Result<Vec<T>, EngineError> {
        let raw: Vec<Value> = self.client.call_no_params(method).await?;
        Ok(parse_lenient(method, raw))
    }
}

fn parse_lenient<T: DeserializeOwned>(method: &str, raw: Vec<Value>) -> Vec<T> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(method, error = %e, "Skipping malformed entry");
                None
            }
        })
        .collect()
}

#[async_trait]
impl Engine for RpcEngine {
    async fn add_download(&self, content_id: &str, display_name: &str) -> Result<(), EngineError> {
        let params = json!({ "content_id": content_id, "display_name": display_name });
        self.client
            .call::<Value>(method::ADD_DOWNLOAD, Some(params))
            .await?;
        Ok(())
    }

    async fn get_queue(&self) -> Result<Vec<Job>, EngineError> {
        self.list(method::GET_QUEUE).await
    }

    async fn get_history(&self) -> Result<Vec<HistoryRecord>, EngineError> {
        self.list(method::GET_HISTORY).await
    }

    async fn remove_history_item(&self, id: &str) -> Result<(), EngineError> {
        self.client
            .call::<Value>(method::REMOVE_HISTORY_ITEM, Some(json!({ "id": id })))
            .await?;
        Ok(())
    }

    async fn clear_history(&self) -> Result<(), EngineError> {
        self.client
            .call_no_params::<Value>(method::CLEAR_HISTORY)
            .await?;
        Ok(())
    }

    async fn retry_download(
        &self,
        content_id: &str,
        display_name: &str,
    ) -> Result<(), EngineError> {
        let params = json!({ "content_id": content_id, "display_name": display_name });
        self.client
            .call::<Value>(method::RETRY_DOWNLOAD, Some(params))
            .await?;
        Ok(())
    }

    async fn check_path_exists(&self, path: &str) -> Result<bool, EngineError> {
        Ok(self
            .client
            .call(method::CHECK_PATH_EXISTS, Some(json!({ "path": path })))
            .await?)
    }

    async fn open_folder(&self, path: &str) -> Result<(), EngineError> {
        self.client
            .call::<Value>(method::OPEN_FOLDER, Some(json!({ "path": path })))
            .await?;
        Ok(())
    }

    async fn subscribe_changes(&self) -> Result<ChangeFeed, EngineError> {
        let (rx, reader) = self
            .client
            .subscribe(method::QUEUE_SUBSCRIBE, method::QUEUE_CHANGED)
            .await?;
        Ok(ChangeFeed::new(rx, Some(reader)))
    }
}
