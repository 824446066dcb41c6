use crate::document::Document;
use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    pub next_id: u64,
    pub created_at: String,
    pub version: u32,
}

/// Document store contents. The only persisted state; the index is rebuilt
/// from it on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub documents: Vec<Document>,
    pub next_id: u64,
}

pub struct SnapshotPaths {
    pub root: PathBuf,
}

impl SnapshotPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn documents(&self) -> PathBuf { self.root.join("documents.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    pub fn exists(&self) -> bool { self.documents().is_file() && self.meta().is_file() }
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn save_documents(paths: &SnapshotPaths, snapshot: &Snapshot) -> Result<()> {
    create_dir_all(&paths.root)?;
    let bytes = bincode::serialize(snapshot)?;
    write_atomic(&paths.documents(), &bytes)
}

pub fn load_documents(paths: &SnapshotPaths) -> Result<Snapshot> {
    let mut f = File::open(paths.documents())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let snapshot = bincode::deserialize(&buf)?;
    Ok(snapshot)
}

pub fn save_meta(paths: &SnapshotPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_string_pretty(meta)?;
    write_atomic(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &SnapshotPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Persist documents first and meta last, so a readable meta.json always
/// describes a complete documents file.
pub fn save_snapshot(paths: &SnapshotPaths, snapshot: &Snapshot) -> Result<()> {
    save_documents(paths, snapshot)?;
    let meta = MetaFile {
        num_docs: snapshot.documents.len(),
        next_id: snapshot.next_id,
        created_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        version: SNAPSHOT_VERSION,
    };
    save_meta(paths, &meta)?;
    tracing::info!(root = %paths.root.display(), num_docs = meta.num_docs, "snapshot saved");
    Ok(())
}

pub fn load_snapshot(paths: &SnapshotPaths) -> Result<Snapshot> {
    let meta = load_meta(paths)?;
    if meta.version != SNAPSHOT_VERSION {
        return Err(SearchError::Validation(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            meta.version
        )));
    }
    let snapshot = load_documents(paths)?;
    if snapshot.documents.len() != meta.num_docs {
        tracing::warn!(
            expected = meta.num_docs,
            found = snapshot.documents.len(),
            "snapshot document count differs from meta.json"
        );
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ExtractedDocument;

    fn sample() -> Snapshot {
        let docs = vec![
            Document::from_extracted(0, ExtractedDocument::new("alpha").with_author("Alice")).unwrap(),
            Document::from_extracted(4, ExtractedDocument::new("beta")).unwrap(),
        ];
        Snapshot { documents: docs, next_id: 7 }
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        assert!(!paths.exists());

        save_snapshot(&paths, &sample()).unwrap();
        assert!(paths.exists());
        assert_eq!(load_snapshot(&paths).unwrap(), sample());

        let meta = load_meta(&paths).unwrap();
        assert_eq!(meta.num_docs, 2);
        assert_eq!(meta.next_id, 7);
        assert_eq!(meta.version, SNAPSHOT_VERSION);
        assert!(!meta.created_at.is_empty());
    }

    #[test]
    fn rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        save_snapshot(&paths, &sample()).unwrap();
        let meta = MetaFile { num_docs: 2, next_id: 7, created_at: String::new(), version: 99 };
        save_meta(&paths, &meta).unwrap();
        assert!(matches!(load_snapshot(&paths), Err(SearchError::Validation(_))));
    }

    #[test]
    fn missing_snapshot_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path().join("nothing-here"));
        assert!(matches!(load_snapshot(&paths), Err(SearchError::Io(_))));
    }
}
