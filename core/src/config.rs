//! Engine configuration.
//!
//! Every field has a default so a partial JSON file (or none at all) yields a
//! working engine. Binaries load the file first and then apply CLI overrides.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg = serde_json::from_str(&raw)?;
        Ok(cfg)
    }
}

/// How punctuation and symbol characters are treated before splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Punctuation {
    /// Punctuation splits tokens: "e-mail" -> ["e", "mail"]
    #[default]
    Boundary,
    /// Punctuation is deleted: "e-mail" -> ["email"]
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default)]
    pub punctuation: Punctuation,
    /// Replaces the built-in English stop words when set. An empty list
    /// disables stop-word removal.
    #[serde(default)]
    pub stopwords: Option<Vec<String>>,
    /// English Snowball stemming of surviving tokens
    #[serde(default)]
    pub stem: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { punctuation: Punctuation::Boundary, stopwords: None, stem: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringAlgorithm {
    #[default]
    Bm25,
    TfIdf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub algorithm: ScoringAlgorithm,
    #[serde(default = "default_k1")]
    pub k1: f32,
    #[serde(default = "default_b")]
    pub b: f32,
    /// TF-IDF only: use ln(1 + N/df) instead of ln(N/df)
    #[serde(default)]
    pub smoothed_idf: bool,
}

fn default_k1() -> f32 { 1.5 }
fn default_b() -> f32 { 0.75 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { algorithm: ScoringAlgorithm::Bm25, k1: default_k1(), b: default_b(), smoothed_idf: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    /// Maximum snippet length in characters, ellipses excluded
    #[serde(default = "default_snippet_len")]
    pub snippet_len: usize,
}

fn default_top_k() -> usize { 10 }
fn default_max_top_k() -> usize { 100 }
fn default_snippet_len() -> usize { 200 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_top_k: default_top_k(), max_top_k: default_max_top_k(), snippet_len: default_snippet_len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bm25_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.scoring.algorithm, ScoringAlgorithm::Bm25);
        assert!((cfg.scoring.k1 - 1.5).abs() < f32::EPSILON);
        assert!((cfg.scoring.b - 0.75).abs() < f32::EPSILON);
        assert_eq!(cfg.search.default_top_k, 10);
        assert_eq!(cfg.search.snippet_len, 200);
        assert_eq!(cfg.normalizer.punctuation, Punctuation::Boundary);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(
            r#"{"scoring": {"algorithm": "tf_idf"}, "normalizer": {"stem": true}}"#,
        )
        .unwrap();
        assert_eq!(cfg.scoring.algorithm, ScoringAlgorithm::TfIdf);
        assert!((cfg.scoring.k1 - 1.5).abs() < f32::EPSILON);
        assert!(cfg.normalizer.stem);
        assert_eq!(cfg.search.max_top_k, 100);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"search": {"snippet_len": 80}}"#).unwrap();
        let cfg = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.search.snippet_len, 80);
        assert_eq!(cfg.search.default_top_k, 10);
    }
}
