//! Retrieval engine for the DocuMind document service: a document store,
//! text normalizer, inverted index, BM25/TF-IDF scoring and a query planner
//! that returns ranked hits with snippets.

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod extract;
pub mod index;
pub mod persist;
pub mod planner;
pub mod scorer;
pub mod snippet;
pub mod tokenizer;

pub use config::EngineConfig;
pub use document::{Document, DocumentMetadata, DocumentStore, DocumentSummary, ExtractedDocument, MetadataField, MetadataFilter};
pub use engine::SearchEngine;
pub use error::{Result, SearchError};
pub use index::{DocId, IndexStats, InvertedIndex, Posting, PostingList};
pub use planner::{Query, SearchHit, SearchResults};
