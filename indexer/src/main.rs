use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use documind_core::document::{MetadataField, MetadataFilter};
use documind_core::extract::{extract_file, SourceFormat};
use documind_core::persist::SnapshotPaths;
use documind_core::{EngineConfig, ExtractedDocument, SearchEngine, SearchError};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "documind-indexer")]
#[command(about = "Build and inspect DocuMind corpus snapshots", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest markdown/text/docx files and JSON/JSONL records into a snapshot
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output snapshot directory
        #[arg(long)]
        output: String,
        /// Stem tokens (English Snowball)
        #[arg(long, default_value_t = false)]
        stem: bool,
    },
    /// Print corpus statistics of a snapshot
    Stats {
        #[arg(long)]
        snapshot: String,
    },
    /// Run a query against a snapshot
    Search {
        #[arg(long)]
        snapshot: String,
        #[arg(long)]
        q: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
}

#[derive(Default)]
struct BuildReport {
    ingested: usize,
    skipped: usize,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Build { input, output, stem } => {
            config.normalizer.stem |= stem;
            build_snapshot(&input, &output, config)
        }
        Commands::Stats { snapshot } => {
            let engine = SearchEngine::open(config, &SnapshotPaths::new(&snapshot))?;
            println!("{}", serde_json::to_string_pretty(&engine.stats())?);
            Ok(())
        }
        Commands::Search { snapshot, q, author, k } => {
            let engine = SearchEngine::open(config, &SnapshotPaths::new(&snapshot))?;
            let filters: Vec<MetadataFilter> =
                author.into_iter().map(|a| MetadataFilter::equals(MetadataField::Author, a)).collect();
            for hit in engine.search(&q, &filters, k)? {
                println!("{}", serde_json::to_string(&hit)?);
            }
            Ok(())
        }
    }
}

fn build_snapshot(input: &str, output: &str, config: EngineConfig) -> Result<()> {
    let input_path = Path::new(input);
    if !input_path.exists() {
        bail!("input path does not exist: {input}");
    }
    let engine = SearchEngine::new(config);
    let mut report = BuildReport::default();

    for file in collect_files(input_path) {
        match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => index_jsonl(&engine, &file, &mut report)?,
            Some("json") => index_json(&engine, &file, &mut report)?,
            _ => index_document_file(&engine, &file, &mut report)?,
        }
    }

    let stats = engine.stats();
    tracing::info!(
        ingested = report.ingested,
        skipped = report.skipped,
        num_terms = stats.distinct_term_count,
        avg_len = stats.average_document_length,
        "ingested documents"
    );

    engine.save_snapshot(&SnapshotPaths::new(output))?;
    tracing::info!(output, "snapshot build complete");
    Ok(())
}

fn collect_files(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && is_supported(p) {
                files.push(p.to_path_buf());
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

fn is_supported(p: &Path) -> bool {
    matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) || SourceFormat::from_path(p).is_some()
}

fn index_document_file(engine: &SearchEngine, file: &Path, report: &mut BuildReport) -> Result<()> {
    match extract_file(file) {
        Ok(doc) => ingest_doc(engine, doc, &file.display().to_string(), report),
        Err(SearchError::Validation(reason)) => {
            tracing::warn!(file = %file.display(), %reason, "skipping file");
            report.skipped += 1;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn index_jsonl(engine: &SearchEngine, file: &Path, report: &mut BuildReport) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: ExtractedDocument = serde_json::from_str(&line)?;
        ingest_doc(engine, doc, &format!("{}:{}", file.display(), lineno + 1), report)?;
    }
    Ok(())
}

fn index_json(engine: &SearchEngine, file: &Path, report: &mut BuildReport) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let source = file.display().to_string();
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: ExtractedDocument = serde_json::from_value(v)?;
                ingest_doc(engine, doc, &source, report)?;
            }
        }
        serde_json::Value::Object(_) => {
            let doc: ExtractedDocument = serde_json::from_value(json)?;
            ingest_doc(engine, doc, &source, report)?;
        }
        _ => tracing::warn!(file = %source, "expected a JSON object or array, skipping"),
    }
    Ok(())
}

/// Invalid documents are skipped and counted; anything else aborts the build.
fn ingest_doc(engine: &SearchEngine, doc: ExtractedDocument, source: &str, report: &mut BuildReport) -> Result<()> {
    match engine.ingest(doc) {
        Ok(id) => {
            tracing::debug!(doc_id = id, source, "ingested");
            report.ingested += 1;
            Ok(())
        }
        Err(SearchError::Validation(reason)) => {
            tracing::warn!(source, %reason, "skipping invalid document");
            report.skipped += 1;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
