use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use wattguard::config::WattguardConfig;
use wattguard::training;

#[derive(Parser)]
#[command(
    name = "wattguard-train",
    about = "Train the power-consumption anomaly model on synthetic data",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (default: $WATTGUARD_CONFIG, then /etc/wattguard/wattguard.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = WattguardConfig::resolve(cli.config.as_deref())?;
    wattguard::init_tracing(&config.logging);

    let report = training::train_anomaly_model(&config.training, &config.model.path)?;

    println!("\nwattguard training report");
    println!("Model:    {}", report.model_path.display());
    println!(
        "Samples:  {} (mean {:.1} W, std {:.1} W, max {:.1} W)",
        report.summary.count, report.summary.mean, report.summary.std_dev, report.summary.max
    );
    println!("Offset:   {:.6}", report.offset);
    println!("\n{:<10} | {:<8} | {:<8} | Score", "Power", "Expected", "Actual");
    println!("{:-<10}-|-{:-<8}-|-{:-<8}-|-{:-<10}", "", "", "", "");
    for check in &report.checks {
        println!(
            "{:<10} | {:<8} | {:<8} | {:+.4}{}",
            format!("{} W", check.power),
            check.expected.to_string(),
            check.actual.to_string(),
            check.anomaly_score,
            if check.passed() { "" } else { "  <- mismatch" }
        );
    }
    println!();

    Ok(())
}
