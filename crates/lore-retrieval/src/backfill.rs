//! Tag backfill for resources stored without tags.
//!
//! One pass over the untagged set: generate tags per resource and commit
//! each update on its own. A generator or storage failure stops the pass;
//! updates already committed stay in place.

use lore_core::LoreError;
use lore_store::ResourceStore;
use serde::Serialize;
use tracing::{debug, info};

use crate::keywords::extract_keywords;

/// Produces a comma-separated tag string for a resource's content.
///
/// Any `Fn(&str) -> Result<String, LoreError>` closure is a tag generator.
pub trait TagGenerator {
    /// Generate tags for `content`.
    ///
    /// # Errors
    ///
    /// Returns [`LoreError::Capability`] if the backing service fails.
    fn generate_tags(&self, content: &str) -> Result<String, LoreError>;
}

impl<F> TagGenerator for F
where
    F: Fn(&str) -> Result<String, LoreError>,
{
    fn generate_tags(&self, content: &str) -> Result<String, LoreError> {
        self(content)
    }
}

/// Offline tagger: the most frequent content keywords, comma-joined.
///
/// # Examples
///
/// ```
/// use lore_retrieval::{KeywordTagger, TagGenerator};
///
/// let tags = KeywordTagger::new(2)
///     .generate_tags("Mallets strike the bars. Harder mallets give brighter bars.")
///     .unwrap();
/// assert_eq!(tags, "mallets,bars");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct KeywordTagger {
    max_tags: usize,
}

impl KeywordTagger {
    pub fn new(max_tags: usize) -> Self {
        Self { max_tags }
    }
}

impl Default for KeywordTagger {
    fn default() -> Self {
        Self::new(5)
    }
}

impl TagGenerator for KeywordTagger {
    fn generate_tags(&self, content: &str) -> Result<String, LoreError> {
        Ok(extract_keywords(content, self.max_tags).join(","))
    }
}

/// Outcome of a backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    /// Untagged resources found at the start of the pass.
    pub scanned: usize,
    /// Resources whose tags were written.
    pub tagged: usize,
}

/// Tag every currently untagged resource.
///
/// # Errors
///
/// Returns the first generator or storage error; the remaining resources
/// are left untouched.
pub fn backfill_tags<G>(store: &ResourceStore, generator: &G) -> Result<BackfillReport, LoreError>
where
    G: TagGenerator + ?Sized,
{
    backfill_tags_with_progress(store, generator, |_, _| {})
}

/// Like [`backfill_tags`], calling `on_progress(done, total)` after each
/// resource is processed.
///
/// Generated tags that are blank after trimming are not written, so the
/// resource stays untagged for a later pass.
///
/// # Errors
///
/// Returns the first generator or storage error; the remaining resources
/// are left untouched.
pub fn backfill_tags_with_progress<G, P>(
    store: &ResourceStore,
    generator: &G,
    mut on_progress: P,
) -> Result<BackfillReport, LoreError>
where
    G: TagGenerator + ?Sized,
    P: FnMut(usize, usize),
{
    let untagged = store.list_untagged()?;
    let total = untagged.len();
    let mut report = BackfillReport {
        scanned: total,
        tagged: 0,
    };

    for (done, resource) in untagged.iter().enumerate() {
        let tags = generator.generate_tags(&resource.content)?;
        let tags = tags.trim();

        if tags.is_empty() {
            debug!(id = resource.id, name = %resource.name, "generator produced no tags");
        } else {
            store.update_tags(resource.id, tags)?;
            report.tagged += 1;
            debug!(id = resource.id, tags, "tagged resource");
        }
        on_progress(done + 1, total);
    }

    info!(scanned = report.scanned, tagged = report.tagged, "tag backfill finished");
    Ok(report)
}
