use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use wattguard::config::WattguardConfig;

#[derive(Parser)]
#[command(
    name = "wattguard-serve",
    about = "Serve power-consumption anomaly analysis over HTTP",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (default: $WATTGUARD_CONFIG, then /etc/wattguard/wattguard.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = WattguardConfig::resolve(cli.config.as_deref())?;
    wattguard::init_tracing(&config.logging);

    tracing::info!(
        bind = %config.server.bind,
        model = %config.model.path.display(),
        "starting wattguard service"
    );
    wattguard::serve(&config).await
}
