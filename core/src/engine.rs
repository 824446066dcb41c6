//! The retrieval engine facade: owns the document store and the inverted
//! index behind one reader/writer lock and exposes ingest, remove, search
//! and stats to the transport layer.
//!
//! Every mutation updates the store and the index inside a single write
//! section, so a concurrent query sees either the old or the new version of
//! a document, never a half-retracted one. Text is normalized before the
//! lock is taken and no I/O happens while it is held.

use crate::config::EngineConfig;
use crate::document::{Document, DocumentStore, DocumentSummary, ExtractedDocument, MetadataFilter};
use crate::error::{Result, SearchError};
use crate::index::{DocId, IndexStats, InvertedIndex};
use crate::persist::{self, Snapshot, SnapshotPaths};
use crate::planner::{Query, QueryPlanner, SearchHit, SearchResults};
use crate::scorer::{scorer_from_config, Scorer};
use crate::tokenizer::{Normalizer, Token};
use parking_lot::RwLock;

#[derive(Default)]
struct EngineState {
    store: DocumentStore,
    index: InvertedIndex,
}

pub struct SearchEngine {
    state: RwLock<EngineState>,
    normalizer: Normalizer,
    scorer: Box<dyn Scorer>,
    config: EngineConfig,
}

impl Default for SearchEngine {
    fn default() -> Self { Self::new(EngineConfig::default()) }
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Self {
        let normalizer = Normalizer::new(&config.normalizer);
        let scorer = scorer_from_config(&config.scoring);
        tracing::debug!(scorer = scorer.name(), "search engine created");
        Self { state: RwLock::new(EngineState::default()), normalizer, scorer, config }
    }

    /// Restore documents from a snapshot and rebuild the index from them.
    pub fn from_snapshot(config: EngineConfig, snapshot: Snapshot) -> Result<Self> {
        for doc in &snapshot.documents {
            doc.validate()?;
        }
        let engine = Self::new(config);
        {
            let mut state = engine.state.write();
            state.store = DocumentStore::from_parts(snapshot.documents, snapshot.next_id);
            engine.rebuild(&mut state);
        }
        Ok(engine)
    }

    /// Load the snapshot under `paths` if one exists, otherwise start empty.
    pub fn open(config: EngineConfig, paths: &SnapshotPaths) -> Result<Self> {
        if paths.exists() {
            let snapshot = persist::load_snapshot(paths)?;
            Self::from_snapshot(config, snapshot)
        } else {
            tracing::info!(root = %paths.root.display(), "no snapshot found, starting with an empty corpus");
            Ok(Self::new(config))
        }
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn normalizer(&self) -> &Normalizer { &self.normalizer }

    /// Store a new document under a freshly allocated id.
    pub fn ingest(&self, doc: ExtractedDocument) -> Result<DocId> {
        let mut document = Document::from_extracted(0, doc)?;
        let tokens = self.normalizer.normalize(&document.text);

        let mut state = self.state.write();
        document.id = state.store.allocate_id()?;
        let id = document.id;
        self.apply_put(&mut state, document, &tokens)?;
        Ok(id)
    }

    /// Insert under `id`, or fully replace the document already stored there.
    pub fn put(&self, id: DocId, doc: ExtractedDocument) -> Result<DocId> {
        let document = Document::from_extracted(id, doc)?;
        let tokens = self.normalizer.normalize(&document.text);

        let mut state = self.state.write();
        self.apply_put(&mut state, document, &tokens)?;
        Ok(id)
    }

    fn apply_put(&self, state: &mut EngineState, document: Document, tokens: &[Token]) -> Result<()> {
        let id = document.id;
        let replaced = state.store.put(document)?.is_some();

        // Retract the old postings completely before posting the new ones.
        let indexed = state.index.remove_document(id).and_then(|was_indexed| {
            if was_indexed != replaced {
                return Err(SearchError::IndexConsistency(format!(
                    "document {id}: stored={replaced} but indexed={was_indexed}"
                )));
            }
            state.index.add_document(id, tokens)
        });
        if let Err(err) = indexed {
            self.repair(state, err);
        }
        tracing::debug!(doc_id = id, tokens = tokens.len(), replaced, "document stored");
        Ok(())
    }

    /// Delete a document and its postings. Returns whether it existed.
    pub fn remove(&self, id: DocId) -> bool {
        let mut state = self.state.write();
        if !state.store.delete(id) {
            return false;
        }
        match state.index.remove_document(id) {
            Ok(true) => {}
            Ok(false) => {
                let err = SearchError::IndexConsistency(format!("stored document {id} was not indexed"));
                self.repair(&mut state, err);
            }
            Err(err) => self.repair(&mut state, err),
        }
        tracing::debug!(doc_id = id, "document removed");
        true
    }

    pub fn get(&self, id: DocId) -> Result<Document> {
        self.state.read().store.get(id).cloned()
    }

    pub fn list(&self) -> Vec<DocumentSummary> { self.state.read().store.list() }

    pub fn search(&self, raw_text: &str, filters: &[MetadataFilter], top_k: usize) -> Result<Vec<SearchHit>> {
        let query = Query { raw_text: raw_text.to_string(), filters: filters.to_vec(), top_k };
        self.execute(&query).map(|r| r.hits)
    }

    pub fn execute(&self, query: &Query) -> Result<SearchResults> {
        let first = {
            let state = self.state.read();
            self.plan(&state, query)
        };
        match first {
            Err(err @ SearchError::IndexConsistency(_)) => {
                self.repair(&mut self.state.write(), err);
                let state = self.state.read();
                self.plan(&state, query)
            }
            other => other,
        }
    }

    fn plan(&self, state: &EngineState, query: &Query) -> Result<SearchResults> {
        QueryPlanner::new(&state.store, &state.index, &self.normalizer, self.scorer.as_ref(), &self.config.search)
            .execute(query)
    }

    pub fn stats(&self) -> IndexStats { self.state.read().index.stats() }

    pub fn len(&self) -> usize { self.state.read().store.len() }

    pub fn is_empty(&self) -> bool { self.state.read().store.is_empty() }

    /// Copy of the store contents, taken under the read lock.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot { documents: state.store.iter().cloned().collect(), next_id: state.store.next_id() }
    }

    /// Snapshot under the lock, write files after releasing it.
    pub fn save_snapshot(&self, paths: &SnapshotPaths) -> Result<()> {
        let snapshot = self.snapshot();
        persist::save_snapshot(paths, &snapshot)
    }

    /// Drop the index and rebuild it from the store.
    pub fn rebuild_index(&self) {
        let mut state = self.state.write();
        self.rebuild(&mut state);
    }

    fn rebuild(&self, state: &mut EngineState) {
        let EngineState { store, index } = state;
        index.clear();
        for doc in store.iter() {
            let tokens = self.normalizer.normalize(&doc.text);
            // The index was just cleared, so ids cannot collide.
            if let Err(err) = index.add_document(doc.id, &tokens) {
                tracing::error!(doc_id = doc.id, error = %err, "failed to index document during rebuild");
            }
        }
        tracing::info!(documents = index.document_count(), terms = index.distinct_terms(), "index rebuilt");
    }

    /// Fatal in debug builds; in release, log and rebuild from the store.
    fn repair(&self, state: &mut EngineState, err: SearchError) {
        tracing::error!(error = %err, "index diverged from document store, rebuilding");
        if cfg!(debug_assertions) {
            panic!("{err}");
        }
        self.rebuild(state);
    }

    /// Full check that the index reflects exactly the stored documents:
    /// structural invariants plus per-document length and term frequencies.
    pub fn check_consistency(&self) -> Result<()> {
        let state = self.state.read();
        state.index.verify_against(&state.store.ids())?;
        for doc in state.store.iter() {
            let tokens = self.normalizer.normalize(&doc.text);
            if state.index.doc_len(doc.id) != Some(tokens.len() as u32) {
                return Err(SearchError::IndexConsistency(format!("length mismatch for document {}", doc.id)));
            }
            for tok in &tokens {
                let expected = tokens.iter().filter(|t| t.term == tok.term).count() as u32;
                if state.index.term_frequency(&tok.term, doc.id) != expected {
                    return Err(SearchError::IndexConsistency(format!(
                        "term {:?} under-posted for document {}",
                        tok.term, doc.id
                    )));
                }
            }
        }
        Ok(())
    }
}
