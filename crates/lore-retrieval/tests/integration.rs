use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use lore_core::{LoreError, RetrievalConfig, ScoringStrategy};
use lore_retrieval::{
    backfill_tags, KeywordExpander, KeywordTagger, QueryExpander, RetrievalPipeline,
};
use lore_store::ResourceStore;

fn seeded_store() -> Arc<ResourceStore> {
    let store = Arc::new(ResourceStore::in_memory().unwrap());
    store
        .insert_resource(
            "Xylophone Basics",
            "A xylophone is a percussion instrument played with mallets.",
            Some(""),
            Some("music,instruments"),
        )
        .unwrap();
    store
        .insert_resource(
            "Marimba Care",
            "Keep marimba bars dry. Use soft mallets on low bars.",
            Some("Maintenance tips for wooden percussion"),
            None,
        )
        .unwrap();
    store
        .insert_resource(
            "Sourdough Starter",
            "Feed the starter flour and water daily.",
            None,
            Some("baking,bread"),
        )
        .unwrap();
    store
}

/// Expander standing in for a language model.
struct ScriptedExpander;

impl QueryExpander for ScriptedExpander {
    fn optimized_description(&self, _query: &str) -> Result<Option<String>, LoreError> {
        Ok(Some("wooden percussion instrument".into()))
    }

    fn keywords(&self, _query: &str, _max: usize) -> Result<Vec<String>, LoreError> {
        Ok(vec!["mallets".into(), "xylophone".into()])
    }
}

#[test]
fn xylophone_scenario_scores_name_plus_content() {
    let pipeline = RetrievalPipeline::new(seeded_store(), &RetrievalConfig::default());
    let results = pipeline.retrieve("xylophone", 3, 2048);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Xylophone Basics");
    assert!((results[0].score - 3.5).abs() < f64::EPSILON);
    assert_eq!(results[0].tags, "music,instruments");
}

#[test]
fn expansion_widens_recall_without_duplicates() {
    let pipeline = RetrievalPipeline::new(seeded_store(), &RetrievalConfig::default())
        .with_expander(ScriptedExpander);
    let results = pipeline.retrieve("xylophone", 5, 2048);

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"Xylophone Basics"));
    assert!(names.contains(&"Marimba Care"));
    assert!(!names.contains(&"Sourdough Starter"));

    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(unique.len(), names.len());
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn result_count_is_capped() {
    let pipeline = RetrievalPipeline::new(seeded_store(), &RetrievalConfig::default())
        .with_expander(ScriptedExpander);
    assert_eq!(pipeline.retrieve("xylophone", 1, 2048).len(), 1);
    assert!(pipeline.retrieve("xylophone", 0, 2048).is_empty());
}

#[test]
fn identical_calls_are_deterministic() {
    let store = seeded_store();
    let first = RetrievalPipeline::new(Arc::clone(&store), &RetrievalConfig::default())
        .with_expander(KeywordExpander)
        .retrieve("marimba mallets bars", 3, 64);
    let second = RetrievalPipeline::new(store, &RetrievalConfig::default())
        .with_expander(KeywordExpander)
        .retrieve("marimba mallets bars", 3, 64);
    assert_eq!(first, second);
}

#[test]
fn cached_result_is_stale_after_insert() {
    let store = seeded_store();
    let pipeline = RetrievalPipeline::new(Arc::clone(&store), &RetrievalConfig::default());

    let before = pipeline.retrieve("xylophone", 3, 2048);
    assert_eq!(before.len(), 1);

    store
        .insert_resource("Xylophone Repertoire", "Pieces written for xylophone.", None, None)
        .unwrap();

    // Same arguments: served from cache, new resource not visible.
    let repeated = pipeline.retrieve("xylophone", 3, 2048);
    assert_eq!(repeated, before);

    // Any differing argument is a different key and sees the new resource.
    let widened = pipeline.retrieve("xylophone", 4, 2048);
    assert_eq!(widened.len(), 2);
}

#[test]
fn cached_result_is_stale_after_retag() {
    let store = seeded_store();
    let pipeline = RetrievalPipeline::new(Arc::clone(&store), &RetrievalConfig::default());

    let before = pipeline.retrieve("baking", 3, 2048);
    assert_eq!(before.len(), 1);

    store.update_tags(3, "fermentation").unwrap();
    assert_eq!(pipeline.retrieve("baking", 3, 2048), before);
    assert!(pipeline.retrieve("baking", 3, 100).is_empty());
}

#[test]
fn field_precedence_pipeline_orders_by_matched_field() {
    let pipeline = RetrievalPipeline::new(seeded_store(), &RetrievalConfig::default())
        .with_strategy(ScoringStrategy::FieldPrecedence);
    let results = pipeline.retrieve("percussion", 3, 2048);

    assert_eq!(results[0].name, "Marimba Care");
    assert_eq!(results[0].score, 3.0);
    assert_eq!(results[1].name, "Xylophone Basics");
    assert_eq!(results[1].score, 1.0);
}

#[test]
fn storage_failure_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lore.db");
    let store = Arc::new(ResourceStore::open(&path).unwrap());
    store.insert_resource("Doomed", "xylophone", None, None).unwrap();

    // Drop the table out from under the store.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch("DROP TABLE resources;").unwrap();

    let pipeline = RetrievalPipeline::new(store, &RetrievalConfig::default());
    assert!(pipeline.retrieve("xylophone", 3, 2048).is_empty());
    assert_eq!(pipeline.cache().entry_count(), 0);
}

#[test]
fn backfill_then_retrieve_by_new_tags() {
    let store = seeded_store();
    let report = backfill_tags(store.as_ref(), &KeywordTagger::new(3)).unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.tagged, 1);
    assert!(store.list_untagged().unwrap().is_empty());

    let marimba = store.get_resource(2).unwrap().unwrap();
    assert!(marimba.tag_list().contains(&"bars"));
}

#[test]
fn concurrent_retrieval_is_consistent() {
    let pipeline = Arc::new(
        RetrievalPipeline::new(seeded_store(), &RetrievalConfig::default())
            .with_expander(KeywordExpander),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.retrieve("mallets for xylophone", 3, 2048))
        })
        .collect();

    let outputs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(pipeline.cache().entry_count(), 1);
}
