use anyhow::Result;
use axum::Router;
use clap::Parser;
use documind_core::persist::SnapshotPaths;
use documind_core::{EngineConfig, SearchEngine};
use documind_server::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Snapshot directory; loaded at startup and written on commit/shutdown
    #[arg(long, default_value = "./data")]
    data: PathBuf,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// BM25 term-frequency saturation
    #[arg(long)]
    k1: Option<f32>,
    /// BM25 length normalization
    #[arg(long)]
    b: Option<f32>,
    /// Stem tokens (English Snowball)
    #[arg(long, default_value_t = false)]
    stem: bool,
    /// Snippet length in characters
    #[arg(long)]
    snippet_len: Option<usize>,
}

impl Args {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };
        if let Some(k1) = self.k1 { config.scoring.k1 = k1; }
        if let Some(b) = self.b { config.scoring.b = b; }
        if let Some(len) = self.snippet_len { config.search.snippet_len = len; }
        config.normalizer.stem |= self.stem;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let paths = SnapshotPaths::new(&args.data);
    let engine = Arc::new(SearchEngine::open(args.engine_config()?, &paths)?);
    tracing::info!(documents = engine.len(), data = %args.data.display(), "engine ready");

    let app: Router = build_app(Arc::clone(&engine), Some(args.data.clone()));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    let documents = engine.len();
    tokio::task::spawn_blocking(move || engine.save_snapshot(&paths)).await??;
    tracing::info!(documents, "snapshot saved on shutdown");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
