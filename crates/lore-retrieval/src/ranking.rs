//! Two scoring strategies over the full resource population.
//!
//! - **Field precedence**: the query is a literal, case-insensitive substring
//!   test per field. A resource scores the single best field that matched
//!   (name 4, description 3, tags 2, content 1), never a sum.
//! - **Term overlap**: whitespace-tokenized, lowercased term sets. Each field
//!   contributes `|query ∩ field| * weight`; tags are also split on commas.
//!
//! Both strategies drop zero-score resources, sort descending with a stable
//! sort (ties keep store order), and truncate displayed content.

use std::collections::HashSet;

use lore_core::{RankedResult, Resource, ScoringStrategy};

/// Appended to content cut at the configured length.
pub const TRUNCATION_MARKER: &str = "...";

/// Content length used when the caller has no preference.
pub const DEFAULT_CONTENT_LENGTH: usize = 2048;

/// Per-field multipliers for term-overlap scoring.
///
/// # Examples
///
/// ```
/// use lore_retrieval::FieldWeights;
///
/// let weights = FieldWeights::default();
/// assert!(weights.name > weights.content);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldWeights {
    pub name: f64,
    pub tags: f64,
    pub description: f64,
    pub content: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            name: 2.5,
            tags: 2.0,
            description: 2.0,
            content: 1.0,
        }
    }
}

/// Scores and orders resources against a query.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use lore_core::{Resource, ScoringStrategy};
/// use lore_retrieval::Ranker;
///
/// let resources = vec![Resource {
///     id: 1,
///     name: "Xylophone Basics".into(),
///     description: Some(String::new()),
///     content: "A xylophone is a percussion instrument played with mallets.".into(),
///     tags: Some("music,instruments".into()),
///     created_at: Utc::now(),
/// }];
///
/// let ranked = Ranker::default().rank(&resources, "xylophone", ScoringStrategy::TermOverlap, 3, 2048);
/// assert_eq!(ranked[0].score, 3.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    weights: FieldWeights,
}

impl Ranker {
    /// Create a ranker with custom term-overlap weights.
    pub fn new(weights: FieldWeights) -> Self {
        Self { weights }
    }

    /// The term-overlap weights in use.
    pub fn weights(&self) -> FieldWeights {
        self.weights
    }

    /// Score every resource, keep the positive ones, and return the best
    /// `limit` in descending score order.
    ///
    /// An empty or whitespace-only query matches nothing.
    pub fn rank(
        &self,
        resources: &[Resource],
        query: &str,
        strategy: ScoringStrategy,
        limit: usize,
        content_length: usize,
    ) -> Vec<RankedResult> {
        if query.trim().is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &Resource)> = match strategy {
            ScoringStrategy::FieldPrecedence => {
                let needle = query.to_lowercase();
                resources
                    .iter()
                    .map(|r| (field_precedence_score(r, &needle), r))
                    .collect()
            }
            ScoringStrategy::TermOverlap => {
                let query_terms = terms(query);
                resources
                    .iter()
                    .map(|r| (term_overlap_score(r, &query_terms, &self.weights), r))
                    .collect()
            }
        };

        scored.retain(|(score, _)| *score > 0.0);
        // `sort_by` is stable, so equal scores keep store order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(score, r)| RankedResult {
                name: r.name.clone(),
                content: truncate_content(&r.content, content_length),
                description: r.description_str().to_string(),
                tags: r.tags_str().to_string(),
                score,
            })
            .collect()
    }
}

/// Precedence score for `needle`, which must already be lowercased.
///
/// Returns 4 for a name match, 3 for description, 2 for tags, 1 for
/// content, and 0 when nothing contains the needle.
pub fn field_precedence_score(resource: &Resource, needle: &str) -> f64 {
    if needle.is_empty() {
        return 0.0;
    }
    let contains = |field: &str| field.to_lowercase().contains(needle);

    if contains(&resource.name) {
        4.0
    } else if contains(resource.description_str()) {
        3.0
    } else if contains(resource.tags_str()) {
        2.0
    } else if contains(&resource.content) {
        1.0
    } else {
        0.0
    }
}

/// Weighted term-overlap score for a resource against pre-tokenized query terms.
pub fn term_overlap_score(
    resource: &Resource,
    query_terms: &HashSet<String>,
    weights: &FieldWeights,
) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let overlap = |field: &HashSet<String>| query_terms.intersection(field).count() as f64;

    overlap(&terms(&resource.name)) * weights.name
        + overlap(&tag_terms(resource.tags_str())) * weights.tags
        + overlap(&terms(resource.description_str())) * weights.description
        + overlap(&terms(&resource.content)) * weights.content
}

/// Lowercased whitespace-separated terms. Punctuation is kept.
pub fn terms(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Tag terms: split on commas, then on whitespace, lowercased.
pub fn tag_terms(tags: &str) -> HashSet<String> {
    tags.split(',')
        .flat_map(str::split_whitespace)
        .map(str::to_lowercase)
        .collect()
}

/// Keep at most `max_chars` characters of `content`, appending
/// [`TRUNCATION_MARKER`] when anything was cut.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &content[..byte_idx]),
        None => content.to_string(),
    }
}
