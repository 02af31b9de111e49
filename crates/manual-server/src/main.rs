//! Manual Server - serves the Awesome Manual REST API.

use anyhow::Result;
use clap::Parser;
use manual_core::{seed_demo_content, DataPaths, ManualService, SeedConfig, ServerConfig};
use manual_server::start_server;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "manual-server")]
#[command(about = "REST API server for Awesome Manual")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value_t = ServerConfig::DEFAULT_PORT)]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = ServerConfig::DEFAULT_HOST)]
    host: String,

    /// Data directory (database and uploaded files)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Insert demo manuals when the database is empty
    #[arg(long)]
    seed: bool,

    /// Base URL for demo images
    #[arg(long, default_value = SeedConfig::IMAGE_BASE_URL)]
    seed_image_base: String,

    /// Seed without fetching remote images
    #[arg(long)]
    no_seed_images: bool,

    /// Maximum request body size in bytes
    #[arg(long, default_value_t = ServerConfig::MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG overrides the --debug level
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Awesome Manual server");

    let paths = args
        .data_dir
        .map(DataPaths::new)
        .unwrap_or_default();
    info!("Data directory: {}", paths.root().display());

    let service = ManualService::open(&paths)?;

    if args.seed {
        let image_base = (!args.no_seed_images).then_some(args.seed_image_base.as_str());
        let report = seed_demo_content(&service, image_base).await?;
        if report.skipped {
            info!("Seed skipped: database is not empty");
        }
    }

    let addr = start_server(service, &args.host, args.port, args.max_upload_bytes).await?;
    info!("Manual API running on http://{}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
