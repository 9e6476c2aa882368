//! Durable SQLite storage for resources and the conversation log.
//!
//! Every public operation acquires one pooled connection, runs as its own
//! unit of work, and releases the connection. There is no multi-operation
//! transaction.

pub mod pool;
pub mod store;

pub use store::{ResourceStore, StoreStats};
