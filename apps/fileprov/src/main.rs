//! File provisioner entry point.

mod app;
mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Command::Start(args) => {
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                "starting file provisioner"
            );
            let mut config = config::Config::load(args.config.as_deref())?;
            config.apply_overrides(&args);
            let request = args.provision_request()?;
            rt.block_on(app::start(config, request))?;
            tracing::info!("file provisioner shut down cleanly");
        }
        Command::File { action } => rt.block_on(app::file(action))?,
    }

    Ok(())
}
