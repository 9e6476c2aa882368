//! Core types, configuration, and error handling for lore.
//!
//! This crate provides the shared foundation used by the other lore crates:
//! - [`LoreError`]: unified error type using `thiserror`
//! - [`LoreConfig`]: configuration loaded from `lore.toml`
//! - Shared types: [`Resource`], [`Conversation`], [`RankedResult`],
//!   [`ScoringStrategy`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{HistoryConfig, LoreConfig, RetrievalConfig, StoreConfig};
pub use error::LoreError;
pub use types::{Conversation, OutputFormat, RankedResult, Resource, ScoringStrategy};

/// A convenience `Result` type for lore operations.
pub type Result<T> = std::result::Result<T, LoreError>;
