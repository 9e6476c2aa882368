/// Errors that can occur across lore.
///
/// Lookups that find nothing return `Ok(None)` and empty queries return an
/// empty list, so neither has a variant here. Library crates use this type
/// directly; the binary converts to `miette::Report` at the boundary.
///
/// # Examples
///
/// ```
/// use lore_core::LoreError;
///
/// let err = LoreError::Storage("database is locked".into());
/// assert!(err.to_string().contains("database is locked"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LoreError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence layer unreachable or a constraint was violated.
    #[error("storage error: {0}")]
    #[diagnostic(help("check that the database path is writable and not held by another process"))]
    Storage(String),

    /// An externally supplied capability (tag generator, query expander) failed.
    #[error("capability error: {0}")]
    Capability(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
