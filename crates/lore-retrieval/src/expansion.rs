//! Query expansion capabilities.
//!
//! The pipeline widens recall by searching with strings derived from the
//! user's query. Producing those strings (typically with a language model)
//! happens behind [`QueryExpander`]; the pipeline treats the output as opaque.

use lore_core::LoreError;

use crate::keywords::extract_keywords;

/// Produces derived search strings for a query.
pub trait QueryExpander: Send + Sync {
    /// A rewritten, search-friendly description of the query, if available.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Capability`] if the backing service fails.
    fn optimized_description(&self, query: &str) -> Result<Option<String>, LoreError>;

    /// Up to `max` keywords capturing the query's intent.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Capability`] if the backing service fails.
    fn keywords(&self, query: &str, max: usize) -> Result<Vec<String>, LoreError>;
}

/// Searches with the raw query only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExpansion;

impl QueryExpander for NoExpansion {
    fn optimized_description(&self, _query: &str) -> Result<Option<String>, LoreError> {
        Ok(None)
    }

    fn keywords(&self, _query: &str, _max: usize) -> Result<Vec<String>, LoreError> {
        Ok(Vec::new())
    }
}

/// Offline expander: no description, keywords from local term frequency.
///
/// # Examples
///
/// ```
/// use lore_retrieval::{KeywordExpander, QueryExpander};
///
/// let kws = KeywordExpander.keywords("how do mallets affect xylophone tone", 2).unwrap();
/// assert_eq!(kws, vec!["mallets", "affect"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordExpander;

impl QueryExpander for KeywordExpander {
    fn optimized_description(&self, _query: &str) -> Result<Option<String>, LoreError> {
        Ok(None)
    }

    fn keywords(&self, query: &str, max: usize) -> Result<Vec<String>, LoreError> {
        Ok(extract_keywords(query, max))
    }
}
