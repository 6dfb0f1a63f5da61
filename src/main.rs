mod analysis;
mod arena;
mod behaviour;
mod builder;
mod color;
mod condition;
mod conditions;
mod config;
mod controller;
mod engine;
mod exploration;
mod host;
mod manager;
mod params;
mod registry;
mod state;
mod stats;
mod steering;
mod tree;
mod types;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Experiment directory holding `config.toml`.
    #[arg(long)]
    exp_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate the configured swarm into a new run directory.
    Run,

    /// Print the DOT graph of the configured tree.
    Describe,

    Analyze,

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.exp_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Run => mgr.run_simulation()?,
        Command::Describe => println!("{}", mgr.describe_tree()?),
        Command::Analyze => mgr.run_analysis()?,
        Command::Clean => mgr.clean_runs()?,
    }

    Ok(())
}
