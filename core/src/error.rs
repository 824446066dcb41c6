//! Error types for the retrieval engine.

use crate::DocId;
use thiserror::Error;

/// Errors surfaced by the engine and its persistence helpers.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Malformed document on ingest (empty text, bad metadata)
    #[error("validation error: {0}")]
    Validation(String),

    /// Lookup of an id that is not stored
    #[error("document {0} not found")]
    NotFound(DocId),

    /// Empty query text, non-positive top_k, unknown filter field
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The index drifted from the document store. Internal only; the engine
    /// repairs it by rebuilding.
    #[error("index consistency violated: {0}")]
    IndexConsistency(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            SearchError::Validation("text is empty".into()).to_string(),
            "validation error: text is empty"
        );
        assert_eq!(SearchError::NotFound(7).to_string(), "document 7 not found");
        assert_eq!(
            SearchError::InvalidQuery("top_k must be positive".into()).to_string(),
            "invalid query: top_k must be positive"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "documents.bin");
        let err: SearchError = io.into();
        assert!(matches!(err, SearchError::Io(_)));
        assert!(err.to_string().contains("documents.bin"));
    }
}
