use documind_core::document::{ExtractedDocument, MetadataField, MetadataFilter};
use documind_core::persist::SnapshotPaths;
use documind_core::{EngineConfig, Query, SearchEngine, SearchError};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

fn text(t: &str) -> ExtractedDocument {
    ExtractedDocument::new(t)
}

fn ids(hits: &[documind_core::SearchHit]) -> Vec<u32> {
    hits.iter().map(|h| h.id).collect()
}

#[test]
fn ranks_documents_matching_more_terms_first() {
    let engine = SearchEngine::default();
    let a = engine.ingest(text("marketing strategy for growth")).unwrap();
    let b = engine.ingest(text("growth hacking tactics")).unwrap();
    let c = engine.ingest(text("cooking recipes")).unwrap();

    let hits = engine.search("growth marketing", &[], 2).unwrap();
    assert_eq!(ids(&hits), vec![a, b]);
    assert!(hits[0].score > hits[1].score);

    assert_eq!(ids(&engine.search("cooking", &[], 5).unwrap()), vec![c]);
}

#[test]
fn filters_by_author() {
    let engine = SearchEngine::default();
    let d = engine.ingest(text("report").with_author("Alice")).unwrap();
    engine.ingest(text("report").with_author("Bob")).unwrap();

    let filters = [MetadataFilter::equals(MetadataField::Author, "Alice")];
    let hits = engine.search("report", &filters, 10).unwrap();
    assert_eq!(ids(&hits), vec![d]);
    assert_eq!(hits[0].author, "Alice");
}

#[test]
fn rejects_empty_query_and_zero_k() {
    let engine = SearchEngine::default();
    engine.ingest(text("anything")).unwrap();
    assert!(matches!(engine.search("", &[], 10), Err(SearchError::InvalidQuery(_))));
    assert!(matches!(engine.search("anything", &[], 0), Err(SearchError::InvalidQuery(_))));
}

#[test]
fn unknown_terms_return_nothing() {
    let engine = SearchEngine::default();
    engine.ingest(text("alpha beta")).unwrap();
    assert!(engine.search("gamma", &[], 10).unwrap().is_empty());
}

#[test]
fn repeated_searches_are_identical() {
    let engine = SearchEngine::default();
    for t in ["rust search engine", "search relevance", "engine tuning", "rust rust rust"] {
        engine.ingest(text(t)).unwrap();
    }
    let q = Query::new("rust search engine").with_top_k(3);
    let first = engine.execute(&q).unwrap();
    let second = engine.execute(&q).unwrap();
    assert_eq!(first, second);
}

#[test]
fn reingesting_same_document_keeps_stats() {
    let engine = SearchEngine::default();
    engine.ingest(text("unrelated filler words here")).unwrap();
    let id = engine.ingest(text("marketing strategy for growth").with_author("Alice")).unwrap();
    let before = engine.stats();

    engine.put(id, text("marketing strategy for growth").with_author("Alice")).unwrap();
    assert_eq!(engine.stats(), before);
    engine.check_consistency().unwrap();
}

#[test]
fn extra_occurrence_never_lowers_score() {
    let engine = SearchEngine::default();
    engine.ingest(text("growth is steady")).unwrap();
    engine.ingest(text("cooking recipes for dinner tonight")).unwrap();
    let id = engine.ingest(text("marketing growth plan")).unwrap();

    let score_of = |engine: &SearchEngine| {
        engine.search("growth", &[], 10).unwrap().into_iter().find(|h| h.id == id).map(|h| h.score).unwrap()
    };
    let before = score_of(&engine);
    engine.put(id, text("marketing growth plan growth")).unwrap();
    let after = score_of(&engine);
    assert!(after >= before, "{after} < {before}");
}

#[test]
fn substring_filter_on_title() {
    let engine = SearchEngine::default();
    let q3 = engine.ingest(text("quarterly numbers").with_title("Q3 Report")).unwrap();
    engine.ingest(text("quarterly numbers").with_title("Memo")).unwrap();

    let filters = [MetadataFilter::contains(MetadataField::Title, "report")];
    assert_eq!(ids(&engine.search("quarterly", &filters, 10).unwrap()), vec![q3]);
}

#[test]
fn snapshot_on_disk_restores_search_results() {
    let dir = tempfile::tempdir().unwrap();
    let paths = SnapshotPaths::new(dir.path());

    let engine = SearchEngine::default();
    engine.ingest(text("marketing strategy for growth")).unwrap();
    engine.ingest(text("growth hacking tactics").with_author("Bob")).unwrap();
    engine.save_snapshot(&paths).unwrap();

    let reopened = SearchEngine::open(EngineConfig::default(), &paths).unwrap();
    assert_eq!(
        reopened.search("growth marketing", &[], 10).unwrap(),
        engine.search("growth marketing", &[], 10).unwrap()
    );
    assert_eq!(reopened.stats(), engine.stats());
}

#[test]
fn open_without_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SearchEngine::open(EngineConfig::default(), &SnapshotPaths::new(dir.path())).unwrap();
    assert!(engine.is_empty());
}

#[test]
fn readers_and_writers_run_concurrently() {
    let engine = Arc::new(SearchEngine::default());
    let id = engine.ingest(text("stable anchor document")).unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 0..200 {
                let body = if i % 2 == 0 { "stable anchor document" } else { "stable anchor text revised" };
                engine.put(id, text(body)).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..200 {
                    // The document is replaced, never absent, so "anchor" always hits.
                    let hits = engine.search("anchor", &[], 10).unwrap();
                    assert_eq!(hits.len(), 1);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    engine.check_consistency().unwrap();
}

#[derive(Debug, Clone)]
enum Op {
    Ingest(String),
    Put(u32, String),
    Remove(u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let words = prop::sample::select(vec!["alpha", "beta", "gamma", "delta", "the", "growth", "report"]);
    let body = prop::collection::vec(words, 1..8).prop_map(|w| w.join(" "));
    prop_oneof![
        body.clone().prop_map(Op::Ingest),
        (0u32..6, body).prop_map(|(id, b)| Op::Put(id, b)),
        (0u32..6).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn index_matches_store_after_any_ops(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let engine = SearchEngine::default();
        for op in ops {
            match op {
                Op::Ingest(b) => { engine.ingest(text(&b)).unwrap(); }
                Op::Put(id, b) => { engine.put(id, text(&b)).unwrap(); }
                Op::Remove(id) => { engine.remove(id); }
            }
            prop_assert!(engine.check_consistency().is_ok());
            for term in ["alpha", "beta", "gamma", "delta", "growth", "report"] {
                for hit in engine.search(term, &[], 100).unwrap() {
                    prop_assert!(engine.get(hit.id).is_ok());
                }
            }
        }
        prop_assert_eq!(engine.stats().document_count, engine.len());
    }
}
