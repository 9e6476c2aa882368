//! Offline keyword extraction.
//!
//! Used as the fallback keyword source for query expansion and as a local
//! tag generator when no model-backed capability is wired in.

use std::collections::HashMap;

/// Words too common to be useful as keywords or tags.
const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "and", "any", "are", "because", "been", "before", "being",
    "between", "both", "but", "can", "could", "did", "does", "doing", "down", "during", "each",
    "few", "for", "from", "further", "had", "has", "have", "having", "her", "here", "hers",
    "him", "his", "how", "into", "its", "just", "more", "most", "not", "now", "off", "once",
    "only", "other", "our", "ours", "out", "over", "own", "same", "she", "should", "some",
    "such", "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they",
    "this", "those", "through", "too", "under", "until", "very", "was", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours",
];

const MIN_KEYWORD_CHARS: usize = 3;

/// Extract up to `max` keywords from `text`.
///
/// Terms are runs of alphanumeric characters, lowercased. Terms shorter than
/// three characters, purely numeric terms, and stopwords are dropped. The
/// rest are ordered by frequency, then by first appearance.
///
/// # Examples
///
/// ```
/// use lore_retrieval::keywords::extract_keywords;
///
/// let kws = extract_keywords("How do I tune a xylophone? Xylophone bars are wooden.", 2);
/// assert_eq!(kws, vec!["xylophone", "tune"]);
/// ```
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    let candidates = text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOPWORDS.contains(&t.as_str()));

    for (position, term) in candidates.enumerate() {
        counts.entry(term).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first))| (term, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked.into_iter().take(max).map(|(term, _, _)| term).collect()
}
