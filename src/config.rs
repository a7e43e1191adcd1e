//! Layered configuration.
//!
//! Precedence, lowest first: built-in defaults, the TOML file (`dlq.toml` or
//! the path in `DLQ_CONFIG`), `DLQ_*` environment variables, CLI flags.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_FILE: &str = "dlq.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the engine daemon listens on and clients connect to.
    pub rpc_bind: SocketAddr,
    pub download_directory: PathBuf,
    pub database_path: PathBuf,
    /// Finished jobs kept in the queue before the oldest are retired.
    pub keep_finished: usize,
    /// Delay between progress steps of the simulated fetcher.
    pub fetch_step_ms: u64,
    /// Also delete a record's install directory when the record is removed.
    pub delete_files_on_remove: bool,
    /// Give up on a workshop page that has not answered after this long.
    pub workshop_timeout_secs: u64,
    pub verbose: bool,
    pub json_logs: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_bind: SocketAddr::from(([127, 0, 0, 1], 7878)),
            download_directory: PathBuf::from("download"),
            database_path: PathBuf::from("dlq.db"),
            keep_finished: 20,
            fetch_step_ms: 250,
            delete_files_on_remove: false,
            workshop_timeout_secs: 15,
            verbose: false,
            json_logs: false,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration, applying `overrides` (usually CLI flags) last.
    ///
    /// `overrides` should skip unset fields so they don't mask lower layers.
    pub fn new<T: Serialize>(overrides: Option<&T>) -> Result<Self> {
        let path = std::env::var_os("DLQ_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut figment = Self::figment(Toml::file(path));
        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        figment.extract().context("Invalid configuration")
    }

    fn figment(file: impl figment::Provider) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(file)
            .merge(Env::prefixed("DLQ_").ignore(&["config"]))
    }
}
