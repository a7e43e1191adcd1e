//! Queue and history reconciliation against a download engine.
//!
//! The engine is authoritative for every job and history record. The stores
//! here are read-through caches that replace their snapshot on each fetch;
//! the dispatcher and history store forward mutations and never edit local
//! state themselves.

pub mod dispatcher;
pub mod engine;
pub mod events;
pub mod existence;
pub mod history_store;
pub mod queue_store;
mod rpc_engine;

#[cfg(test)]
pub(crate) mod fake;

pub use dispatcher::{ActionDispatcher, ActionError, AddOutcome, ExpandState};
pub use engine::{ChangeFeed, Engine, EngineError};
pub use events::Subscription;
pub use existence::{ExistenceResolver, HistoryAction, PathCheck};
pub use history_store::HistoryStore;
pub use queue_store::QueueStore;
pub use rpc_engine::RpcEngine;
