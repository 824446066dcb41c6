//! Query planning: validate, normalize, fetch candidates, filter, rank and
//! attach snippets. A planner borrows the engine's components for the
//! duration of one query and keeps no state between calls.

use crate::config::SearchConfig;
use crate::document::{DocumentStore, MetadataFilter};
use crate::error::{Result, SearchError};
use crate::index::{DocId, InvertedIndex};
use crate::scorer::{rank, Scorer};
use crate::snippet::extract_snippet;
use crate::tokenizer::Normalizer;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub raw_text: String,
    #[serde(default)]
    pub filters: Vec<MetadataFilter>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize { DEFAULT_TOP_K }

impl Query {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self { raw_text: raw_text.into(), filters: Vec::new(), top_k: DEFAULT_TOP_K }
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.raw_text.trim().is_empty() {
            return Err(SearchError::InvalidQuery("query text is empty".into()));
        }
        if self.top_k == 0 {
            return Err(SearchError::InvalidQuery("top_k must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: DocId,
    pub title: String,
    pub author: String,
    pub score: f32,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    /// Matching documents before truncation to top_k
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

pub struct QueryPlanner<'a> {
    store: &'a DocumentStore,
    index: &'a InvertedIndex,
    normalizer: &'a Normalizer,
    scorer: &'a dyn Scorer,
    config: &'a SearchConfig,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(
        store: &'a DocumentStore,
        index: &'a InvertedIndex,
        normalizer: &'a Normalizer,
        scorer: &'a dyn Scorer,
        config: &'a SearchConfig,
    ) -> Self {
        Self { store, index, normalizer, scorer, config }
    }

    pub fn execute(&self, query: &Query) -> Result<SearchResults> {
        query.validate()?;

        let terms = self.normalizer.query_terms(&query.raw_text);
        let mut candidates = self.index.candidates(&terms);
        if candidates.is_empty() {
            return Ok(SearchResults::default());
        }

        if !query.filters.is_empty() {
            let allowed = self.store.filter(&query.filters);
            candidates.retain(|id| allowed.contains(id));
        }

        let mut ranked = rank(self.scorer, candidates, &terms, self.index, usize::MAX);
        let total_hits = ranked.len();
        ranked.truncate(query.top_k.min(self.config.max_top_k.max(1)));

        let mut hits = Vec::with_capacity(ranked.len());
        for scored in ranked {
            let doc = self.store.get(scored.doc_id).map_err(|_| {
                SearchError::IndexConsistency(format!("document {} is indexed but not stored", scored.doc_id))
            })?;
            hits.push(SearchHit {
                id: doc.id,
                title: doc.metadata.title.clone(),
                author: doc.metadata.author.clone(),
                score: scored.score,
                snippet: extract_snippet(&doc.text, &terms, self.normalizer, self.config.snippet_len),
            });
        }
        Ok(SearchResults { total_hits, hits })
    }
}
