//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `link`: Commands that read the keyboard (run, monitor)
//! - `keymap`: Keymap inspection (check-keymap, keys)
//! - `utility`: Setup helpers (list-ports, init-config)

pub mod keymap;
pub mod link;
pub mod utility;

use crate::cli::LinkArgs;
use orione_driver::DriverConfig;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Apply command line overrides on top of the loaded config
pub fn apply_link_args(config: &mut DriverConfig, link: &LinkArgs) {
    if let Some(port) = &link.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = link.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(keymap) = &link.keymap {
        config.keymap.path = Some(keymap.clone());
    }
    if let Some(profile) = link.profile {
        config.profile.initial = profile;
    }
}
