//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::task::TaskKind;

/// Front-end asset pipeline with live reload
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: sluice.toml)
    #[arg(short = 'C', long, global = true, default_value = "sluice.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands (default: watch)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build once, then serve the output and rebuild on change
    #[command(visible_alias = "w")]
    Watch {
        #[command(flatten)]
        serve_args: ServeArgs,
    },

    /// Run the full pipeline once
    #[command(visible_alias = "b")]
    Build,

    /// Run the named tasks once, in order
    #[command(visible_alias = "t")]
    Task {
        /// Task names (e.g. `styles`, `clean-font-styles`)
        #[arg(required = true, num_args = 1..)]
        names: Vec<TaskKind>,
    },
}

/// Development server overrides for watch mode.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<std::net::IpAddr>,

    /// Port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Cli {
    /// The effective command: bare `sluice` means watch.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Watch {
            serve_args: ServeArgs::default(),
        })
    }

    pub fn serve_args(&self) -> Option<ServeArgs> {
        match self.command() {
            Commands::Watch { serve_args } => Some(serve_args),
            _ => None,
        }
    }
}
