use std::error::Error;
use std::path::PathBuf;

use cap_config::{write_configuration, Scope};
use cap_sim::{build_pipeline, PipelineOptions};
use clap::Args;

use super::requested_configuration;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// YAML configuration keyed by task path.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Parameter overrides, applied last.
    #[arg(long = "set", value_name = "[PATH:]NAME=VALUE")]
    pub overrides: Vec<String>,
    /// Show only the parameters visible from this task path.
    #[arg(long)]
    pub scope: Option<String>,
    /// Write the resolved configuration to this YAML file.
    #[arg(long)]
    pub write: Option<PathBuf>,
}

pub fn run(args: &ConfigArgs) -> Result<(), Box<dyn Error>> {
    let requested = requested_configuration(args.config.as_deref(), &args.overrides)?;
    let driver = build_pipeline(PipelineOptions::default())?;
    let config = driver.configuration(&requested)?;

    match &args.scope {
        Some(path) => {
            let scope = Scope::from_path(path)?;
            for (name, (origin, value)) in config.effective(&scope) {
                let origin = if origin.is_empty() { "<root>" } else { origin.as_str() };
                println!("{name} = {value}  ({origin})");
            }
        }
        None => print!("{}", config.dump()),
    }
    if let Some(path) = &args.write {
        write_configuration(&config, path)?;
        println!("wrote {}", path.display());
    }
    Ok(())
}
