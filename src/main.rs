use anyhow::{Context, Result};
use clap::Parser;
use recap::{AppState, CaptureEngine, Config, CpalDevice, PipelineSynchronizer, S3Store};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "recap", about = "Recording session and pipeline synchronization service")]
struct Args {
    /// Config file (without extension), as read by the config crate.
    #[arg(long, default_value = "config/recap")]
    config: String,

    /// Override the configured default bucket.
    #[arg(long)]
    bucket: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config).context("Failed to load configuration")?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let store = Arc::new(S3Store::connect().await);
    let synchronizer = Arc::new(PipelineSynchronizer::new(
        store,
        Duration::from_millis(cfg.storage.list_timeout_ms),
    ));
    let device = Arc::new(CpalDevice::new(cfg.audio.input_device.as_deref()));
    let engine = Arc::new(CaptureEngine::new(device));

    let state = AppState {
        engine,
        synchronizer,
        default_bucket: args.bucket.or(cfg.storage.bucket),
        url_ttl: Duration::from_secs(cfg.storage.url_ttl_secs),
        channels: cfg.audio.channels,
    };

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, recap::create_router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}
