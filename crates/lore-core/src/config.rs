use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LoreError;
use crate::types::ScoringStrategy;

/// Top-level configuration loaded from `lore.toml`.
///
/// Every field has a default, so an empty file is a valid configuration.
///
/// # Examples
///
/// ```
/// use lore_core::LoreConfig;
///
/// let config = LoreConfig::default();
/// assert_eq!(config.retrieval.n_results, 3);
/// assert_eq!(config.retrieval.content_length, 2048);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoreConfig {
    /// Database settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Ranking, pipeline, and cache settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Conversation log settings.
    #[serde(default)]
    pub history: HistoryConfig,
}

impl LoreConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Io`] if the file cannot be read, or
    /// [`LoreError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lore_core::LoreConfig;
    /// use std::path::Path;
    ///
    /// let config = LoreConfig::from_file(Path::new("lore.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, LoreError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Toml`] if parsing fails, or
    /// [`LoreError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use lore_core::LoreConfig;
    ///
    /// let toml = r#"
    /// [retrieval]
    /// n_results = 5
    /// "#;
    /// let config = LoreConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.retrieval.n_results, 5);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LoreError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LoreError> {
        if self.retrieval.cache_capacity == 0 {
            return Err(LoreError::Config(
                "retrieval.cache_capacity must be at least 1".into(),
            ));
        }
        if self.store.pool_size == 0 {
            return Err(LoreError::Config("store.pool_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Resource store configuration.
///
/// # Examples
///
/// ```
/// use lore_core::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.path.to_str(), Some("lore.db"));
/// assert_eq!(config.pool_size, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file (default: `lore.db`).
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Number of pooled connections (default: 4).
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// SQLite busy timeout in milliseconds (default: 5000).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("lore.db")
}

fn default_pool_size() -> usize {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            pool_size: default_pool_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Retrieval behavior configuration.
///
/// # Examples
///
/// ```
/// use lore_core::{RetrievalConfig, ScoringStrategy};
///
/// let config = RetrievalConfig::default();
/// assert_eq!(config.cache_capacity, 256);
/// assert_eq!(config.max_keywords, 5);
/// assert_eq!(config.strategy, ScoringStrategy::TermOverlap);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results returned when the caller does not ask for a count (default: 3).
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    /// Characters of content kept per result before truncation (default: 2048).
    #[serde(default = "default_content_length")]
    pub content_length: usize,
    /// Maximum number of memoized queries (default: 256).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Keywords derived per query (default: 5).
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    /// Scoring strategy for the pipeline (default: term-overlap).
    #[serde(default)]
    pub strategy: ScoringStrategy,
}

fn default_n_results() -> usize {
    3
}

fn default_content_length() -> usize {
    2048
}

fn default_cache_capacity() -> u64 {
    256
}

fn default_max_keywords() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_results: default_n_results(),
            content_length: default_content_length(),
            cache_capacity: default_cache_capacity(),
            max_keywords: default_max_keywords(),
            strategy: ScoringStrategy::default(),
        }
    }
}

/// Conversation log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// How many recent conversations `history` shows (default: 15).
    #[serde(default = "default_recent_conversations")]
    pub recent_conversations: usize,
}

fn default_recent_conversations() -> usize {
    15
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recent_conversations: default_recent_conversations(),
        }
    }
}
