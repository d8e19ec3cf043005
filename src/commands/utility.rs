//! Utility command handlers.

use anyhow::{bail, Context};
use orione_driver::transport::list_ports as available_ports;
use orione_driver::DriverConfig;
use std::path::Path;

use super::CommandResult;

/// List serial ports the keyboard may be on
pub fn list_ports() -> CommandResult {
    let ports = available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    println!("Serial ports:");
    for port in ports {
        println!("  {:<24} {}", port.name, port.kind);
    }
    Ok(())
}

/// Write the default config to `path`
pub fn init_config(path: &Path, force: bool) -> CommandResult {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    DriverConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
