//! Relevance scoring over the inverted index.
//!
//! Scorers read term statistics straight from the index; query terms are
//! expected to be distinct and already normalized.

use crate::config::{ScoringAlgorithm, ScoringConfig};
use crate::index::{DocId, InvertedIndex};
use std::cmp::Ordering;

/// Pluggable relevance function. Higher is more relevant; a score of zero
/// means the document does not match.
pub trait Scorer: Send + Sync {
    fn score(&self, doc_id: DocId, query_terms: &[String], index: &InvertedIndex) -> f32;

    /// Name for logging
    fn name(&self) -> &str;
}

pub fn scorer_from_config(cfg: &ScoringConfig) -> Box<dyn Scorer> {
    match cfg.algorithm {
        ScoringAlgorithm::Bm25 => Box::new(Bm25Scorer::new(cfg.k1, cfg.b)),
        ScoringAlgorithm::TfIdf => Box::new(TfIdfScorer { smoothed_idf: cfg.smoothed_idf }),
    }
}

/// Okapi BM25.
///
/// For each query term t present in the document:
/// score += IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl / avgdl))
///
/// with IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1), which stays positive
/// even for terms present in every document.
#[derive(Debug, Clone)]
pub struct Bm25Scorer {
    k1: f32,
    b: f32,
}

impl Default for Bm25Scorer {
    fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

impl Bm25Scorer {
    pub fn new(k1: f32, b: f32) -> Self { Self { k1, b } }

    pub fn idf(n: usize, df: usize) -> f32 {
        let (n, df) = (n as f32, df as f32);
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

impl Scorer for Bm25Scorer {
    fn score(&self, doc_id: DocId, query_terms: &[String], index: &InvertedIndex) -> f32 {
        let Some(doc_len) = index.doc_len(doc_id) else {
            return 0.0;
        };
        let n = index.document_count();
        // avgdl is zero only when every document is empty, so |d| is zero too.
        let avg_len = index.avg_doc_len() as f32;
        let rel_len = if avg_len > 0.0 { doc_len as f32 / avg_len } else { 0.0 };
        let norm = self.k1 * (1.0 - self.b + self.b * rel_len);

        let mut score = 0.0;
        for term in query_terms {
            let tf = index.term_frequency(term, doc_id) as f32;
            if tf == 0.0 {
                continue;
            }
            let idf = Self::idf(n, index.doc_freq(term));
            score += idf * (tf * (self.k1 + 1.0)) / (tf + norm);
        }
        score
    }

    fn name(&self) -> &str { "bm25" }
}

/// Log-scaled TF-IDF: sum of (1 + ln tf) * idf over matching query terms.
#[derive(Debug, Clone, Default)]
pub struct TfIdfScorer {
    /// ln(1 + N/df) instead of ln(N/df); keeps terms found in every
    /// document from scoring zero
    pub smoothed_idf: bool,
}

impl Scorer for TfIdfScorer {
    fn score(&self, doc_id: DocId, query_terms: &[String], index: &InvertedIndex) -> f32 {
        let n = index.document_count().max(1) as f32;
        let mut score = 0.0;
        for term in query_terms {
            let tf_raw = index.term_frequency(term, doc_id);
            if tf_raw == 0 {
                continue;
            }
            let tf = 1.0 + (tf_raw as f32).ln();
            let df_t = index.doc_freq(term).max(1) as f32;
            let idf = if self.smoothed_idf { (1.0 + n / df_t).ln() } else { (n / df_t).ln() };
            score += tf * idf;
        }
        score
    }

    fn name(&self) -> &str { "tf-idf" }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f32,
}

/// Descending score, ties by ascending doc id.
pub fn ranking_order(a: &ScoredDoc, b: &ScoredDoc) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id))
}

/// Score `candidates`, drop non-matches, sort and keep the best `limit`.
pub fn rank<I>(scorer: &dyn Scorer, candidates: I, query_terms: &[String], index: &InvertedIndex, limit: usize) -> Vec<ScoredDoc>
where
    I: IntoIterator<Item = DocId>,
{
    let mut scored: Vec<ScoredDoc> = candidates
        .into_iter()
        .map(|doc_id| ScoredDoc { doc_id, score: scorer.score(doc_id, query_terms, index) })
        .filter(|s| s.score > 0.0)
        .collect();
    scored.sort_by(ranking_order);
    scored.truncate(limit);
    scored
}
