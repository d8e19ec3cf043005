// CLI definitions using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "orione-driver")]
#[command(author, version, about = "Orione split keyboard host driver")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/orione/driver.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Overrides for the serial link and keymap
#[derive(Args, Clone, Default)]
pub struct LinkArgs {
    /// Serial port (e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Keymap TOML file
    #[arg(short, long)]
    pub keymap: Option<PathBuf>,

    /// Profile to start on
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub profile: Option<u8>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read the keyboard and inject keys through a virtual device (default)
    Run {
        #[command(flatten)]
        link: LinkArgs,

        /// Exit when the link drops instead of reconnecting
        #[arg(long)]
        no_reconnect: bool,
    },

    /// Read the keyboard and log resolved keys without injecting them
    #[command(visible_aliases = ["mon"])]
    Monitor {
        #[command(flatten)]
        link: LinkArgs,

        /// Log raw coordinates only, skipping dispatch and keymap
        #[arg(long)]
        raw: bool,
    },

    /// Validate a keymap file and print its layers
    #[command(name = "check-keymap", visible_aliases = ["check"])]
    CheckKeymap {
        /// Keymap TOML file
        file: PathBuf,
    },

    /// List available serial ports
    #[command(name = "list-ports", visible_aliases = ["ports"])]
    ListPorts,

    /// List key names accepted in keymaps
    Keys,

    /// Write a config file with default values
    #[command(name = "init-config")]
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
