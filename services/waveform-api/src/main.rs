//! Waveform API Server
//!
//! HTTP front end of the event-bound seismic waveform archive.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use waveform_api::config::ServiceConfig;
use waveform_api::state::AppState;

/// Waveform API Server
#[derive(Parser, Debug)]
#[command(name = "waveform-api")]
#[command(about = "Event-bound seismic waveform archive server")]
struct Args {
    /// YAML configuration file; the environment is used when absent
    #[arg(short, long, env = "WAVEFORM_API_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration
    #[arg(short, long, env = "WAVEFORM_API_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "WAVEFORM_API_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;
    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    let mut config = match &args.config {
        Some(path) => ServiceConfig::from_yaml_file(path)?,
        None => ServiceConfig::from_env()?,
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Starting waveform API server");

    let state = Arc::new(AppState::new(&config).await?);
    let app = waveform_api::build_router(state, prometheus);

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen))?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
