use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mipmap_forge::{run, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise --verbose switches on per-step detail
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = cli.to_config().context("Invalid configuration")?;

    info!(
        themes = config.themes.len(),
        buckets = config.buckets.len(),
        res_dir = %config.res_dir.display(),
        store_dir = %config.store_dir.display(),
        "starting icon processing"
    );

    let report = run(&config).context("Failed to prepare output directories")?;

    if !report.any_completed() {
        warn!("no theme produced a complete icon set");
    }

    eprintln!();
    eprintln!("{}", report);

    Ok(())
}
