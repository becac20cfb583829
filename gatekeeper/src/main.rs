mod cli;
mod config;
mod logging;
mod proxy;
mod runtime;
mod server;

use clap::Parser;

use cli::{Cli, Command, ConfigCommand};
use config::GatekeeperConfig;

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config {
            cmd: ConfigCommand::Check { config },
        }) => {
            logging::init_logging();
            let cfg = GatekeeperConfig::from_file(&config).expect("failed to load gatekeeper config");
            runtime::build_pipeline(&cfg).expect("config failed to build a valid pipeline");
            println!("config OK: {}", config.display());
        }

        Some(Command::Run { config }) => {
            logging::init_logging();
            let cfg = GatekeeperConfig::from_file(&config).expect("failed to load gatekeeper config");
            server::run(cfg).expect("gatekeeper server failed");
        }

        None => {
            logging::init_logging();
            let cfg = GatekeeperConfig::from_file("config/gatekeeper.yaml").expect("failed to load gatekeeper config");
            server::run(cfg).expect("gatekeeper server failed");
        }
    }
}
