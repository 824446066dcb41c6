//! Document store: the canonical copy of every ingested document.
//!
//! The inverted index is derived from this store and can always be rebuilt
//! from it; the store never consults the index.

use crate::error::{Result, SearchError};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Sentinel for metadata the extractor could not determine.
pub const UNKNOWN: &str = "Unknown";

const MAX_FIELD_CHARS: usize = 512;

/// Output of a format-specific extractor, the only input `ingest` accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl ExtractedDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Default::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_last_modified(mut self, ts: impl Into<String>) -> Self {
        self.last_modified = Some(ts.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub last_modified: String,
}

impl DocumentMetadata {
    pub fn field(&self, field: MetadataField) -> &str {
        match field {
            MetadataField::Title => &self.title,
            MetadataField::Author => &self.author,
            MetadataField::LastModified => &self.last_modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Validate extractor output and fill missing metadata with [`UNKNOWN`].
    pub fn from_extracted(id: DocId, doc: ExtractedDocument) -> Result<Self> {
        let title = metadata_value("title", doc.title)?;
        let author = metadata_value("author", doc.author)?;
        let last_modified = metadata_value("last_modified", doc.last_modified)?;
        if last_modified != UNKNOWN && !is_iso8601(&last_modified) {
            return Err(SearchError::Validation(format!(
                "last_modified is not an ISO-8601 timestamp: {last_modified:?}"
            )));
        }
        let document = Document { id, text: doc.text, metadata: DocumentMetadata { title, author, last_modified } };
        document.validate()?;
        Ok(document)
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(SearchError::Validation("document text is empty".into()));
        }
        for (name, value) in [("title", &self.metadata.title), ("author", &self.metadata.author)] {
            check_field(name, value)?;
        }
        Ok(())
    }
}

fn metadata_value(name: &str, value: Option<String>) -> Result<String> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(UNKNOWN.to_string()),
        Some(v) => {
            check_field(name, v)?;
            Ok(v.to_string())
        }
    }
}

fn check_field(name: &str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(SearchError::Validation(format!("{name} exceeds {MAX_FIELD_CHARS} characters")));
    }
    if value.chars().any(char::is_control) {
        return Err(SearchError::Validation(format!("{name} contains control characters")));
    }
    Ok(())
}

fn is_iso8601(s: &str) -> bool {
    OffsetDateTime::parse(s, &Rfc3339).is_ok()
        || OffsetDateTime::parse(s, &Iso8601::DEFAULT).is_ok()
        || PrimitiveDateTime::parse(s, &Iso8601::DEFAULT).is_ok()
        || Date::parse(s, &Iso8601::DEFAULT).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Title,
    Author,
    LastModified,
}

impl FromStr for MetadataField {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(MetadataField::Title),
            "author" => Ok(MetadataField::Author),
            "last_modified" => Ok(MetadataField::LastModified),
            other => Err(SearchError::InvalidQuery(format!("unknown filter field: {other}"))),
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataField::Title => "title",
            MetadataField::Author => "author",
            MetadataField::LastModified => "last_modified",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Equals,
    Contains,
}

/// Predicate over one metadata field. Comparisons ignore case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub field: MetadataField,
    pub kind: MatchKind,
    pub value: String,
}

impl MetadataFilter {
    pub fn equals(field: MetadataField, value: impl Into<String>) -> Self {
        Self { field, kind: MatchKind::Equals, value: value.into() }
    }

    pub fn contains(field: MetadataField, value: impl Into<String>) -> Self {
        Self { field, kind: MatchKind::Contains, value: value.into() }
    }

    pub fn matches(&self, meta: &DocumentMetadata) -> bool {
        let actual = meta.field(self.field).to_lowercase();
        let wanted = self.value.trim().to_lowercase();
        match self.kind {
            MatchKind::Equals => actual == wanted,
            MatchKind::Contains => actual.contains(&wanted),
        }
    }
}

/// Listing view of a stored document, without its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: DocId,
    pub title: String,
    pub author: String,
    pub last_modified: String,
    pub chars: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStore {
    docs: BTreeMap<DocId, Document>,
    /// One past the highest id ever used; `DocId::MAX + 1` once exhausted
    next_id: u64,
}

impl DocumentStore {
    pub fn new() -> Self { Self::default() }

    /// Rebuild a store from persisted parts. `next_id` is raised past every
    /// stored id so allocation never collides.
    pub fn from_parts(docs: Vec<Document>, next_id: u64) -> Self {
        let mut store = Self { docs: BTreeMap::new(), next_id };
        for doc in docs {
            store.bump_next_id(doc.id);
            store.docs.insert(doc.id, doc);
        }
        store
    }

    /// Hand out a fresh id. Ids of deleted documents are never reused and
    /// stored ids are never handed out; fails once the id space is used up.
    pub fn allocate_id(&mut self) -> Result<DocId> {
        loop {
            let id = DocId::try_from(self.next_id)
                .map_err(|_| SearchError::Validation("document id space exhausted".into()))?;
            self.next_id += 1;
            if !self.docs.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    pub fn next_id(&self) -> u64 { self.next_id }

    fn bump_next_id(&mut self, id: DocId) {
        self.next_id = self.next_id.max(u64::from(id) + 1);
    }

    /// Insert or replace by id; returns the replaced version.
    pub fn put(&mut self, doc: Document) -> Result<Option<Document>> {
        doc.validate()?;
        self.bump_next_id(doc.id);
        Ok(self.docs.insert(doc.id, doc))
    }

    pub fn get(&self, id: DocId) -> Result<&Document> {
        self.docs.get(&id).ok_or(SearchError::NotFound(id))
    }

    pub fn contains(&self, id: DocId) -> bool { self.docs.contains_key(&id) }

    pub fn delete(&mut self, id: DocId) -> bool { self.docs.remove(&id).is_some() }

    /// Ids whose metadata satisfies every filter.
    pub fn filter(&self, filters: &[MetadataFilter]) -> BTreeSet<DocId> {
        self.docs
            .values()
            .filter(|d| filters.iter().all(|f| f.matches(&d.metadata)))
            .map(|d| d.id)
            .collect()
    }

    pub fn list(&self) -> Vec<DocumentSummary> {
        self.docs
            .values()
            .map(|d| DocumentSummary {
                id: d.id,
                title: d.metadata.title.clone(),
                author: d.metadata.author.clone(),
                last_modified: d.metadata.last_modified.clone(),
                chars: d.text.chars().count(),
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> { self.docs.values() }

    pub fn ids(&self) -> BTreeSet<DocId> { self.docs.keys().copied().collect() }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: DocId, text: &str, author: &str) -> Document {
        Document::from_extracted(id, ExtractedDocument::new(text).with_author(author)).unwrap()
    }

    #[test]
    fn missing_metadata_becomes_unknown() {
        let d = Document::from_extracted(0, ExtractedDocument::new("body").with_title("  ")).unwrap();
        assert_eq!(d.metadata.title, UNKNOWN);
        assert_eq!(d.metadata.author, UNKNOWN);
        assert_eq!(d.metadata.last_modified, UNKNOWN);
    }

    #[test]
    fn rejects_empty_text() {
        let err = Document::from_extracted(0, ExtractedDocument::new(" \n\t")).unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
    }

    #[test]
    fn rejects_malformed_metadata() {
        let bad_author = ExtractedDocument::new("body").with_author("Al\u{0}ice");
        assert!(matches!(Document::from_extracted(0, bad_author), Err(SearchError::Validation(_))));

        let long_title = ExtractedDocument::new("body").with_title("x".repeat(600));
        assert!(matches!(Document::from_extracted(0, long_title), Err(SearchError::Validation(_))));

        let bad_ts = ExtractedDocument::new("body").with_last_modified("yesterday");
        assert!(matches!(Document::from_extracted(0, bad_ts), Err(SearchError::Validation(_))));
    }

    #[test]
    fn accepts_iso_timestamps() {
        for ts in ["2024-03-01T10:15:30", "2024-03-01T10:15:30.123456", "2024-03-01T10:15:30Z", "2024-03-01"] {
            let d = Document::from_extracted(0, ExtractedDocument::new("body").with_last_modified(ts)).unwrap();
            assert_eq!(d.metadata.last_modified, ts);
        }
    }

    #[test]
    fn put_get_delete() {
        let mut store = DocumentStore::new();
        assert!(store.put(doc(3, "first", "Alice")).unwrap().is_none());
        let old = store.put(doc(3, "second", "Alice")).unwrap();
        assert_eq!(old.map(|d| d.text), Some("first".to_string()));
        assert_eq!(store.get(3).unwrap().text, "second");
        assert_eq!(store.next_id(), 4);

        assert!(store.delete(3));
        assert!(!store.delete(3));
        assert!(matches!(store.get(3), Err(SearchError::NotFound(3))));
    }

    #[test]
    fn allocated_ids_are_not_reused() {
        let mut store = DocumentStore::new();
        let a = store.allocate_id().unwrap();
        store.put(doc(a, "one", "x")).unwrap();
        store.delete(a);
        assert_ne!(store.allocate_id().unwrap(), a);
    }

    #[test]
    fn allocation_fails_after_highest_id() {
        let mut store = DocumentStore::new();
        store.put(doc(DocId::MAX, "precious", "Alice")).unwrap();
        assert_eq!(store.next_id(), u64::from(DocId::MAX) + 1);
        assert!(matches!(store.allocate_id(), Err(SearchError::Validation(_))));
        assert_eq!(store.get(DocId::MAX).unwrap().text, "precious");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn allocation_skips_stored_ids() {
        let mut store = DocumentStore::from_parts(Vec::new(), 0);
        store.docs.insert(0, doc(0, "zero", "x"));
        assert_eq!(store.allocate_id().unwrap(), 1);
    }

    #[test]
    fn filter_equals_and_contains() {
        let mut store = DocumentStore::new();
        store.put(doc(0, "report", "Alice")).unwrap();
        store.put(doc(1, "report", "Bob")).unwrap();
        store.put(doc(2, "report", "Alicia Keys")).unwrap();

        let eq = store.filter(&[MetadataFilter::equals(MetadataField::Author, "alice")]);
        assert_eq!(eq.into_iter().collect::<Vec<_>>(), vec![0]);

        let sub = store.filter(&[MetadataFilter::contains(MetadataField::Author, "ali")]);
        assert_eq!(sub.into_iter().collect::<Vec<_>>(), vec![0, 2]);

        assert_eq!(store.filter(&[]).len(), 3);
    }

    #[test]
    fn field_names_parse() {
        assert_eq!("author".parse::<MetadataField>().unwrap(), MetadataField::Author);
        assert!(matches!("colour".parse::<MetadataField>(), Err(SearchError::InvalidQuery(_))));
    }
}
