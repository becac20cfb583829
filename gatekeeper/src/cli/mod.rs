use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gatekeeper", version, about = "Pingora-based authenticating reverse proxy")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway (default)
    Run {
        /// Path to the gatekeeper config file
        #[arg(long, default_value = "config/gatekeeper.yaml")]
        config: PathBuf,
    },

    /// Config file tooling
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Load the config and build the filter pipeline without starting the server.
    Check {
        #[arg(long, default_value = "config/gatekeeper.yaml")]
        config: PathBuf,
    },
}
