//! Download queue and history reconciliation.
//!
//! [`client`] keeps a displayed queue and history consistent with a download
//! engine over a command/event contract. [`daemon`] is a reference engine that
//! speaks the same contract over JSON-RPC.

pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod core;
pub mod daemon;
pub mod db;
pub mod logging;
pub mod rpc;
