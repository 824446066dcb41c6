//! Minimal extractors for the formats the service accepts.
//!
//! Markdown and plain text are read as UTF-8. Word documents are unpacked and
//! their non-blank paragraphs joined with newlines. Every format is titled
//! after the file stem.

use crate::document::ExtractedDocument;
use crate::error::{Result, SearchError};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::SystemTime;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use zip::ZipArchive;

/// Main body part of a WordprocessingML package.
const DOCX_BODY: &str = "word/document.xml";

/// Author recorded for markdown exports, which carry no author field.
pub const MARKDOWN_AUTHOR: &str = "Notion User";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Markdown,
    PlainText,
    Docx,
}

impl SourceFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(SourceFormat::Markdown),
            "txt" => Some(SourceFormat::PlainText),
            "docx" => Some(SourceFormat::Docx),
            _ => None,
        }
    }
}

/// Extract an uploaded file held in memory.
pub fn extract_bytes(filename: &str, bytes: &[u8], last_modified: Option<String>) -> Result<ExtractedDocument> {
    let format = SourceFormat::from_path(filename)
        .ok_or_else(|| SearchError::Validation(format!("unsupported file type: {filename}")))?;
    let (text, author) = match format {
        SourceFormat::Markdown => (utf8_text(filename, bytes)?, Some(MARKDOWN_AUTHOR.to_string())),
        SourceFormat::PlainText => (utf8_text(filename, bytes)?, None),
        SourceFormat::Docx => (docx_text(filename, bytes)?, None),
    };
    let title = Path::new(filename).file_stem().and_then(|s| s.to_str()).map(str::to_string);
    Ok(ExtractedDocument { text, title, author, last_modified })
}

fn utf8_text(filename: &str, bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| SearchError::Validation(format!("{filename} is not valid UTF-8: {e}")))
}

fn unreadable(filename: &str, err: impl fmt::Display) -> SearchError {
    SearchError::Validation(format!("{filename} is not a readable docx: {err}"))
}

fn docx_text(filename: &str, bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| unreadable(filename, e))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| unreadable(filename, e))?
        .read_to_string(&mut xml)
        .map_err(|e| unreadable(filename, e))?;
    let paragraphs = docx_paragraphs(&xml).map_err(|e| unreadable(filename, e))?;
    Ok(paragraphs.join("\n"))
}

/// Text of each non-blank `w:p`, with `w:tab` and `w:br` kept as whitespace.
fn docx_paragraphs(xml: &str) -> quick_xml::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    fn finish(current: &mut String, paragraphs: &mut Vec<String>) {
        let para = std::mem::take(current);
        if !para.trim().is_empty() {
            paragraphs.push(para);
        }
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => finish(&mut current, &mut paragraphs),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                b"w:p" => finish(&mut current, &mut paragraphs),
                _ => {}
            },
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }
    finish(&mut current, &mut paragraphs);
    Ok(paragraphs)
}

/// Extract a file on disk, using its modification time as `last_modified`.
pub fn extract_file(path: &Path) -> Result<ExtractedDocument> {
    let bytes = fs::read(path)?;
    let modified = fs::metadata(path)?.modified().ok().and_then(format_system_time);
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
    extract_bytes(name, &bytes, modified)
}

/// Extract an upload; its `last_modified` is the time of upload.
pub fn extract_upload(filename: &str, bytes: &[u8]) -> Result<ExtractedDocument> {
    extract_bytes(filename, bytes, format_system_time(SystemTime::now()))
}

fn format_system_time(t: SystemTime) -> Option<String> {
    OffsetDateTime::from(t).format(&Rfc3339).ok()
}
