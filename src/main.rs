//! Orione Keyboard Driver CLI
//!
//! Reads key transitions from the keyboard's serial link and injects them as
//! OS key events.

use anyhow::{Context, Result};
use clap::Parser;
use orione_driver::DriverConfig;
use tracing::{debug, info};

// CLI definitions
mod cli;
use cli::{Cli, Commands, LinkArgs};

// Command handlers
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(DriverConfig::default_path);

    match cli.command {
        None => {
            // Default: run the driver with the config as-is
            let config = load_config(&config_path, &LinkArgs::default())?;
            commands::link::run(config, true).await?;
        }
        Some(Commands::Run { link, no_reconnect }) => {
            let config = load_config(&config_path, &link)?;
            commands::link::run(config, !no_reconnect).await?;
        }
        Some(Commands::Monitor { link, raw }) => {
            let config = load_config(&config_path, &link)?;
            commands::link::monitor(config, raw).await?;
        }
        Some(Commands::CheckKeymap { file }) => {
            commands::keymap::check_keymap(&file)?;
        }
        Some(Commands::Keys) => {
            commands::keymap::keys()?;
        }
        Some(Commands::ListPorts) => {
            commands::utility::list_ports()?;
        }
        Some(Commands::InitConfig { force }) => {
            commands::utility::init_config(&config_path, force)?;
        }
    }

    Ok(())
}

/// Load the config file and apply command line overrides
fn load_config(path: &std::path::Path, link: &LinkArgs) -> Result<DriverConfig> {
    info!("Loading config from {:?}", path);
    let mut config = DriverConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    commands::apply_link_args(&mut config, link);
    debug!("Effective config: {:?}", config);
    Ok(config)
}
