//! Sluice - a front-end asset pipeline with a live-reloading dev server.

mod cli;
mod config;
mod core;
mod embed;
mod freshness;
mod glob;
mod logger;
mod orchestrator;
mod reload;
mod serve;
mod task;
mod transcode;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{PipelineConfig, init_config};

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = init_config(PipelineConfig::load(cli)?);
    if config.dev {
        debug!("config"; "development mode");
    }

    match cli.command() {
        Commands::Watch { .. } => orchestrator::watch::watch(config),
        Commands::Build => orchestrator::build(&config),
        Commands::Task { names } => orchestrator::run_tasks(&names, &config),
    }
}
