//! Market maker simulator - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Automated market-making simulator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via MMSIM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    mmsim_telemetry::init_logging()?;

    info!("Starting mmsim v{}", env!("CARGO_PKG_VERSION"));

    // Determine config source: CLI arg > MMSIM_CONFIG env var > default path
    let config = match args.config.or_else(|| std::env::var("MMSIM_CONFIG").ok()) {
        Some(path) => {
            info!(config_path = %path, "Loading configuration");
            mmsim_app::AppConfig::from_file(&path)?
        }
        None => mmsim_app::AppConfig::load()?,
    };
    info!(
        markets = config.markets.len(),
        tick_interval_ms = config.engine.tick_interval_ms,
        "Configuration loaded"
    );

    // Create and run the application
    let app = mmsim_app::Application::new(config)?;
    app.run().await?;

    Ok(())
}
