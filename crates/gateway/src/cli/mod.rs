pub mod config;

use clap::{Parser, Subcommand};

/// PairLink — an automated-messaging gateway.
#[derive(Debug, Parser)]
#[command(name = "pairlink", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Locate, read, and parse the config file.
///
/// The path comes from `PAIRLINK_CONFIG` when set, else `config.toml`
/// in the working directory. A missing file yields the built-in
/// defaults, so the gateway runs out of the box.
pub fn load_config() -> anyhow::Result<(pl_domain::config::Config, String)> {
    let config_path = std::env::var("PAIRLINK_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        pl_domain::config::Config::load(std::path::Path::new(&config_path))
            .map_err(|e| anyhow::anyhow!("{e}"))?
    } else {
        pl_domain::config::Config::default()
    };

    Ok((config, config_path))
}
