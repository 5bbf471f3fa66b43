//! gospf - build-and-reload harness for gospf web applications.

mod analyze;
mod app;
mod build;
mod cli;
mod codegen;
mod config;
mod embed;
mod error;
mod harness;
mod logger;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }
    logger::set_verbose(cli.verbose);

    match &cli.command {
        Commands::Run { target, mode, port } => {
            let mut config = cli::load_app(&cli, &target.app, mode)?;
            if let Some(port) = port {
                config.http.port = *port;
            }
            cli::run::run_app(config)
        }
        Commands::Build { target, mode } => {
            let config = cli::load_app(&cli, &target.app, mode)?;
            let bin = cli::build::build_app(std::sync::Arc::new(config))?;
            println!("{}", bin.display());
            Ok(())
        }
        Commands::Clean { target } => {
            let config = cli::load_app(&cli, &target.app, config::DEFAULT_MODE)?;
            cli::clean::clean_app(&config)
        }
    }
}
