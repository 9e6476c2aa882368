//! Ranking, multi-query retrieval, result caching, and tag backfill.
//!
//! The [`pipeline::RetrievalPipeline`] widens recall by issuing several
//! derived queries (the raw query, an optimized description, and extracted
//! keywords), scores each against the full resource set with a
//! [`ranking::Ranker`], merges and deduplicates the candidates, and memoizes
//! the outcome in a bounded [`cache::QueryCache`].
//!
//! Language-model work stays outside this crate: query expansion and tag
//! generation arrive as injected [`expansion::QueryExpander`] and
//! [`backfill::TagGenerator`] capabilities.

pub mod backfill;
pub mod cache;
pub mod expansion;
pub mod keywords;
pub mod pipeline;
pub mod ranking;

pub use backfill::{backfill_tags, BackfillReport, KeywordTagger, TagGenerator};
pub use cache::{CacheKey, QueryCache};
pub use expansion::{KeywordExpander, NoExpansion, QueryExpander};
pub use pipeline::{format_context, RetrievalPipeline};
pub use ranking::{FieldWeights, Ranker};
