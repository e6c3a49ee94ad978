pub mod config;
pub mod run;
pub mod subsample;

use std::error::Error;
use std::path::Path;

use cap_config::{load_configuration, Configuration};
use cap_sim::apply_overrides;

/// Configuration file (if any) with `--set` overrides applied on top.
pub fn requested_configuration(
    file: Option<&Path>,
    overrides: &[String],
) -> Result<Configuration, Box<dyn Error>> {
    let mut requested = match file {
        Some(path) => load_configuration(path)?,
        None => Configuration::new(),
    };
    apply_overrides(&mut requested, overrides)?;
    Ok(requested)
}
