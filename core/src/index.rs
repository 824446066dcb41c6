use crate::error::{Result, SearchError};
use crate::tokenizer::Token;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
    /// Token positions of the term within the document, ascending
    pub positions: Vec<u32>,
}

/// Postings for one term, sorted by doc_id, at most one entry per document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    entries: Vec<Posting>,
}

impl PostingList {
    pub fn entries(&self) -> &[Posting] { &self.entries }

    pub fn get(&self, doc_id: DocId) -> Option<&Posting> {
        self.entries.binary_search_by_key(&doc_id, |p| p.doc_id).ok().map(|i| &self.entries[i])
    }

    fn upsert(&mut self, posting: Posting) {
        match self.entries.binary_search_by_key(&posting.doc_id, |p| p.doc_id) {
            Ok(i) => self.entries[i] = posting,
            Err(i) => self.entries.insert(i, posting),
        }
    }

    fn remove(&mut self, doc_id: DocId) -> bool {
        match self.entries.binary_search_by_key(&doc_id, |p| p.doc_id) {
            Ok(i) => {
                self.entries.remove(i);
                true
            }
            Err(_) => false,
        }
    }

    /// Document frequency of the term.
    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Corpus-level figures reported for health checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub average_document_length: f64,
    pub distinct_term_count: usize,
}

/// In-memory inverted index. Derived data only: it can be dropped and
/// rebuilt from the document store at any time.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, PostingList>,
    /// doc_id -> terms it contributed, used to retract a document
    doc_terms: HashMap<DocId, Vec<String>>,
    doc_lengths: HashMap<DocId, u32>,
    total_len: u64,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Post every distinct term of `tokens` for `doc_id`. The id must not be
    /// indexed already; replacing goes through `remove_document` first.
    pub fn add_document(&mut self, doc_id: DocId, tokens: &[Token]) -> Result<()> {
        if self.doc_lengths.contains_key(&doc_id) {
            return Err(SearchError::IndexConsistency(format!("document {doc_id} is already indexed")));
        }

        let mut positions: HashMap<&str, Vec<u32>> = HashMap::new();
        for tok in tokens {
            positions.entry(tok.term.as_str()).or_default().push(tok.position);
        }

        let mut terms = Vec::with_capacity(positions.len());
        for (term, pos) in positions {
            let posting = Posting { doc_id, tf: pos.len() as u32, positions: pos };
            self.postings.entry(term.to_string()).or_default().upsert(posting);
            terms.push(term.to_string());
        }
        terms.sort_unstable();

        let len = tokens.len() as u32;
        self.doc_terms.insert(doc_id, terms);
        self.doc_lengths.insert(doc_id, len);
        self.total_len += u64::from(len);
        Ok(())
    }

    /// Retract every posting of `doc_id`. Terms left without postings are
    /// dropped. Returns whether the document was indexed.
    pub fn remove_document(&mut self, doc_id: DocId) -> Result<bool> {
        let Some(terms) = self.doc_terms.remove(&doc_id) else {
            return Ok(false);
        };
        let len = self.doc_lengths.remove(&doc_id).unwrap_or(0);
        self.total_len = self.total_len.saturating_sub(u64::from(len));

        let mut missing = Vec::new();
        for term in terms {
            let emptied = match self.postings.get_mut(&term) {
                Some(list) => {
                    if !list.remove(doc_id) {
                        missing.push(term.clone());
                    }
                    list.is_empty()
                }
                None => {
                    missing.push(term.clone());
                    false
                }
            };
            if emptied {
                self.postings.remove(&term);
            }
        }

        if missing.is_empty() {
            Ok(true)
        } else {
            Err(SearchError::IndexConsistency(format!(
                "document {doc_id} had no posting for terms {missing:?}"
            )))
        }
    }

    /// OR-union of the documents posted under any of `terms`.
    pub fn candidates<S: AsRef<str>>(&self, terms: &[S]) -> BTreeSet<DocId> {
        let mut out = BTreeSet::new();
        for term in terms {
            if let Some(list) = self.postings.get(term.as_ref()) {
                out.extend(list.entries.iter().map(|p| p.doc_id));
            }
        }
        out
    }

    pub fn posting_for(&self, term: &str) -> Option<&PostingList> { self.postings.get(term) }

    pub fn term_frequency(&self, term: &str, doc_id: DocId) -> u32 {
        self.postings.get(term).and_then(|l| l.get(doc_id)).map(|p| p.tf).unwrap_or(0)
    }

    pub fn doc_freq(&self, term: &str) -> usize { self.postings.get(term).map(PostingList::len).unwrap_or(0) }

    pub fn doc_len(&self, doc_id: DocId) -> Option<u32> { self.doc_lengths.get(&doc_id).copied() }

    pub fn contains(&self, doc_id: DocId) -> bool { self.doc_lengths.contains_key(&doc_id) }

    pub fn document_count(&self) -> usize { self.doc_lengths.len() }

    pub fn distinct_terms(&self) -> usize { self.postings.len() }

    pub fn avg_doc_len(&self) -> f64 {
        match self.doc_lengths.len() {
            0 => 0.0,
            n => self.total_len as f64 / n as f64,
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            document_count: self.document_count(),
            average_document_length: self.avg_doc_len(),
            distinct_term_count: self.distinct_terms(),
        }
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.doc_terms.clear();
        self.doc_lengths.clear();
        self.total_len = 0;
    }

    /// Check the index against the set of stored ids: same documents, no
    /// empty or dangling posting lists, reverse index matching postings.
    pub fn verify_against(&self, stored: &BTreeSet<DocId>) -> Result<()> {
        let indexed: BTreeSet<DocId> = self.doc_lengths.keys().copied().collect();
        if &indexed != stored {
            return Err(SearchError::IndexConsistency(format!(
                "indexed documents {indexed:?} differ from stored {stored:?}"
            )));
        }
        let mut posted = 0usize;
        for (term, list) in &self.postings {
            if list.is_empty() {
                return Err(SearchError::IndexConsistency(format!("empty posting list for {term:?}")));
            }
            for p in &list.entries {
                if !stored.contains(&p.doc_id) {
                    return Err(SearchError::IndexConsistency(format!(
                        "term {term:?} references missing document {}",
                        p.doc_id
                    )));
                }
            }
            posted += list.len();
        }
        let reverse: usize = self.doc_terms.values().map(Vec::len).sum();
        if reverse != posted {
            return Err(SearchError::IndexConsistency(format!(
                "reverse index holds {reverse} entries, postings hold {posted}"
            )));
        }
        let total: u64 = self.doc_lengths.values().map(|&l| u64::from(l)).sum();
        if total != self.total_len {
            return Err(SearchError::IndexConsistency(format!(
                "total length {} does not match per-document sum {total}",
                self.total_len
            )));
        }
        Ok(())
    }
}
