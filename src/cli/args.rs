//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Build-and-reload harness for gospf applications
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, relative to the application root
    #[arg(short = 'C', long, global = true, default_value = "conf/app.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Application to operate on.
#[derive(clap::Args, Debug, Clone)]
pub struct AppArgs {
    /// Import path of the application, or its directory
    #[arg(value_name = "APP", value_hint = clap::ValueHint::AnyPath)]
    pub app: String,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the application, rebuilding it as its code changes
    #[command(visible_alias = "r")]
    Run {
        #[command(flatten)]
        target: AppArgs,

        /// Run mode passed to the application
        #[arg(default_value = "dev")]
        mode: String,

        /// Port to listen on (overrides [http] port)
        port: Option<u16>,
    },

    /// Build the application once and print the binary path
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        target: AppArgs,

        /// Run mode the build is configured for
        #[arg(default_value = "dev")]
        mode: String,
    },

    /// Remove generated code (app/tmp and app/routes)
    #[command(visible_alias = "c")]
    Clean {
        #[command(flatten)]
        target: AppArgs,
    },
}
