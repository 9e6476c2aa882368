use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, taggable unit of retrievable text.
///
/// `description` and `tags` may be absent in storage. Scoring reads them
/// through [`Resource::description_str`] and [`Resource::tags_str`], which
/// treat absence as the empty string.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use lore_core::Resource;
///
/// let resource = Resource {
///     id: 1,
///     name: "Xylophone Basics".into(),
///     description: None,
///     content: "A xylophone is a percussion instrument.".into(),
///     tags: Some("music,instruments".into()),
///     created_at: Utc::now(),
/// };
/// assert_eq!(resource.description_str(), "");
/// assert_eq!(resource.tag_list(), vec!["music", "instruments"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Store-assigned id, strictly increasing in insertion order.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Short summary of the content, if any.
    pub description: Option<String>,
    /// Full text body.
    pub content: String,
    /// Comma-separated tags, if any.
    pub tags: Option<String>,
    /// Insertion time. Never mutated.
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// The description, or `""` when absent.
    pub fn description_str(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// The raw tag string, or `""` when absent.
    pub fn tags_str(&self) -> &str {
        self.tags.as_deref().unwrap_or("")
    }

    /// Tags split on commas, trimmed, with empty entries dropped.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags_str()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Whether the resource has no tags (absent or empty string).
    pub fn is_untagged(&self) -> bool {
        self.tags_str().is_empty()
    }
}

/// One exchange in the append-only conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Store-assigned id.
    pub id: i64,
    /// What the user asked.
    pub user_input: String,
    /// What the assistant answered.
    pub assistant_response: String,
    /// When the exchange was logged.
    pub created_at: DateTime<Utc>,
}

/// A scored resource produced by a ranking pass. Not persisted.
///
/// # Examples
///
/// ```
/// use lore_core::RankedResult;
///
/// let result = RankedResult {
///     name: "Xylophone Basics".into(),
///     content: "A xylophone is...".into(),
///     description: String::new(),
///     tags: "music,instruments".into(),
///     score: 3.5,
/// };
/// assert!(result.score > 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    /// Resource name.
    pub name: String,
    /// Content, possibly truncated with a trailing marker.
    pub content: String,
    /// Description (empty when the resource has none).
    pub description: String,
    /// Raw tag string (empty when the resource has none).
    pub tags: String,
    /// Relevance score, never negative.
    pub score: f64,
}

/// Which scoring strategy the ranking engine applies.
///
/// # Examples
///
/// ```
/// use lore_core::ScoringStrategy;
///
/// let s: ScoringStrategy = "field-precedence".parse().unwrap();
/// assert_eq!(s, ScoringStrategy::FieldPrecedence);
/// assert_eq!(ScoringStrategy::default(), ScoringStrategy::TermOverlap);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringStrategy {
    /// Score by the single highest-precedence field containing the query.
    FieldPrecedence,
    /// Weighted sum of per-field term overlap.
    #[default]
    TermOverlap,
}

impl fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringStrategy::FieldPrecedence => write!(f, "field-precedence"),
            ScoringStrategy::TermOverlap => write!(f, "term-overlap"),
        }
    }
}

impl FromStr for ScoringStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "field-precedence" | "precedence" => Ok(ScoringStrategy::FieldPrecedence),
            "term-overlap" | "overlap" => Ok(ScoringStrategy::TermOverlap),
            other => Err(format!("unknown scoring strategy: {other}")),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use lore_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable listings.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(tags: Option<&str>) -> Resource {
        Resource {
            id: 7,
            name: "Rust Ownership".into(),
            description: None,
            content: "Every value has a single owner.".into(),
            tags: tags.map(String::from),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn absent_fields_read_as_empty() {
        let r = resource(None);
        assert_eq!(r.description_str(), "");
        assert_eq!(r.tags_str(), "");
        assert!(r.tag_list().is_empty());
        assert!(r.is_untagged());
    }

    #[test]
    fn empty_tag_string_is_untagged() {
        assert!(resource(Some("")).is_untagged());
        assert!(!resource(Some("rust")).is_untagged());
    }

    #[test]
    fn tag_list_trims_and_drops_blanks() {
        let r = resource(Some(" rust , ,memory,"));
        assert_eq!(r.tag_list(), vec!["rust", "memory"]);
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn scoring_strategy_roundtrips_through_display() {
        for s in [ScoringStrategy::FieldPrecedence, ScoringStrategy::TermOverlap] {
            assert_eq!(s.to_string().parse::<ScoringStrategy>().unwrap(), s);
        }
        assert!("bm25".parse::<ScoringStrategy>().is_err());
    }

    #[test]
    fn scoring_strategy_serializes_kebab_case() {
        let json = serde_json::to_string(&ScoringStrategy::FieldPrecedence).unwrap();
        assert_eq!(json, "\"field-precedence\"");
    }

    #[test]
    fn resource_serializes_camel_case() {
        let json = serde_json::to_value(resource(Some("a"))).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
    }
}
