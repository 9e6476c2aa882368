use chrono::Utc;
use lore_core::{Resource, ScoringStrategy};
use lore_retrieval::keywords::extract_keywords;
use lore_retrieval::pipeline::merge_candidates;
use lore_retrieval::ranking::{truncate_content, TRUNCATION_MARKER};
use lore_retrieval::Ranker;
use proptest::prelude::*;

fn resource(id: i64, name: String, content: String, tags: Option<String>) -> Resource {
    Resource {
        id,
        name,
        description: None,
        content,
        tags,
        created_at: Utc::now(),
    }
}

fn strategy() -> impl Strategy<Value = ScoringStrategy> {
    prop_oneof![
        Just(ScoringStrategy::TermOverlap),
        Just(ScoringStrategy::FieldPrecedence),
    ]
}

fn population() -> impl Strategy<Value = Vec<Resource>> {
    prop::collection::vec(
        ("[a-z]{1,8}( [a-z]{1,8}){0,2}", "[a-z ]{0,60}", prop::option::of("[a-z,]{0,20}")),
        0..12,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (name, content, tags))| resource(i as i64 + 1, name, content, tags))
            .collect()
    })
}

proptest! {
    #[test]
    fn ranked_scores_are_positive_and_descending(
        resources in population(),
        query in "[a-z]{1,8}( [a-z]{1,8}){0,2}",
        strategy in strategy(),
        limit in 0usize..10,
    ) {
        let ranked = Ranker::default().rank(&resources, &query, strategy, limit, 2048);
        prop_assert!(ranked.len() <= limit);
        prop_assert!(ranked.iter().all(|r| r.score > 0.0));
        prop_assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn name_match_outranks_content_only_match(word in "[a-z]{3,10}", filler in "[0-9]{1,5}") {
        let resources = vec![
            resource(1, filler.clone(), format!("about {word}"), None),
            resource(2, word.clone(), filler, None),
        ];
        for strategy in [ScoringStrategy::TermOverlap, ScoringStrategy::FieldPrecedence] {
            let ranked = Ranker::default().rank(&resources, &word, strategy, 2, 2048);
            prop_assert_eq!(ranked.len(), 2);
            prop_assert_eq!(&ranked[0].name, &word);
        }
    }

    #[test]
    fn truncation_respects_length(content in "\\PC{0,300}", max in 0usize..200) {
        let out = truncate_content(&content, max);
        let kept = content.chars().count().min(max);
        if content.chars().count() > max {
            prop_assert_eq!(out.chars().count(), kept + TRUNCATION_MARKER.chars().count());
            prop_assert!(out.ends_with(TRUNCATION_MARKER));
        } else {
            prop_assert_eq!(out, content);
        }
    }

    #[test]
    fn merged_names_are_unique(
        lists in prop::collection::vec(
            prop::collection::vec(("[a-c]", 0.5f64..5.0), 0..6),
            0..4,
        ),
        n in 0usize..8,
    ) {
        let lists: Vec<Vec<lore_core::RankedResult>> = lists
            .into_iter()
            .map(|list| {
                list.into_iter()
                    .map(|(name, score)| lore_core::RankedResult {
                        name,
                        content: String::new(),
                        description: String::new(),
                        tags: String::new(),
                        score,
                    })
                    .collect()
            })
            .collect();
        let merged = merge_candidates(lists, n);
        let mut names: Vec<&str> = merged.iter().map(|r| r.name.as_str()).collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        prop_assert_eq!(names.len(), before);
        prop_assert!(merged.len() <= n);
    }

    #[test]
    fn keywords_are_bounded_and_lowercase(text in "[A-Za-z0-9 ,.?]{0,200}", max in 0usize..8) {
        let kws = extract_keywords(&text, max);
        prop_assert!(kws.len() <= max);
        prop_assert!(kws.iter().all(|k| k.chars().count() >= 3));
        prop_assert!(kws.iter().all(|k| *k == k.to_lowercase()));
    }
}
