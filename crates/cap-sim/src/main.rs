use std::error::Error;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    config::{self, ConfigArgs},
    run::{self, RunArgs},
    subsample::{self, SubsampleArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "cap-sim", about = "CAP toy collision analysis CLI")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate toy collisions and run the spectra analysis under the iterator driver.
    Run(RunArgs),
    /// Aggregate existing partial saves into mean and standard error per bin.
    Subsample(SubsampleArgs),
    /// Print the resolved configuration of the toy pipeline.
    Config(ConfigArgs),
}

fn init_tracing(verbose: bool) -> Result<(), Box<dyn Error>> {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Subsample(args) => subsample::run(&args),
        Command::Config(args) => config::run(&args),
    }
}
