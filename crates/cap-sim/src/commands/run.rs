use std::error::Error;
use std::fs;
use std::path::PathBuf;

use cap_config::Scope;
use cap_core::provenance::RunProvenance;
use cap_hist::JsonFileStore;
use cap_run::RunManifest;
use cap_sim::{
    build_pipeline, export_csv, seed_parameter, PipelineOptions, ANALYSIS_NAME, DRIVER_NAME,
    SOURCE_NAME,
};
use cap_task::{RunContext, Stage};
use clap::Args;

use super::requested_configuration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML configuration keyed by task path.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output directory for histogram documents and the run manifest.
    #[arg(long, default_value = "cap-out")]
    pub out: PathBuf,
    /// Master seed, unless the configuration sets `seed` on the generator.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Iterations to run; overrides `nIterationRequested`.
    #[arg(long)]
    pub events: Option<i64>,
    /// Iterations per subsample; turns on partial saves and subsample analysis.
    #[arg(long)]
    pub subsample_every: Option<i64>,
    /// Multiplicity threshold of the `HighMult` category.
    #[arg(long, default_value_t = 10)]
    pub high_multiplicity: usize,
    /// Parameter overrides, applied last.
    #[arg(long = "set", value_name = "[PATH:]NAME=VALUE")]
    pub overrides: Vec<String>,
    /// Also write the final histograms as CSV.
    #[arg(long)]
    pub csv: bool,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let mut requested = requested_configuration(args.config.as_deref(), &[])?;
    let root = Scope::root();
    requested.set_parameter(&root, "histoOutputPath", args.out.to_string_lossy().into_owned());
    if let Some(events) = args.events {
        requested.set_parameter(&root, "nIterationRequested", events);
    }
    if let Some(every) = args.subsample_every {
        requested.set_parameter(&root, "doPartialSave", true);
        requested.set_parameter(&root, "doSubsampleAnalysis", true);
        requested.set_parameter(&root, "nIterationPartialSave", every);
    }
    cap_sim::apply_overrides(&mut requested, &args.overrides)?;

    let mut driver = build_pipeline(PipelineOptions {
        seed: args.seed,
        high_multiplicity: args.high_multiplicity,
    })?;
    let config = driver.configuration(&requested)?;
    let source_scope = driver.scope().child(SOURCE_NAME)?;
    let seed = seed_parameter(config.view(&source_scope))?.unwrap_or(args.seed);
    let mut ctx = RunContext::new(config, Box::new(JsonFileStore::new()));
    let report = driver.run(&mut ctx)?;

    let provenance = RunProvenance::now(DRIVER_NAME).with_seed(seed);
    let manifest = RunManifest::capture(&driver, &ctx, report.clone(), provenance);
    let manifest_path = args.out.join("manifest.json");
    manifest.write(&manifest_path)?;
    tracing::info!(path = %manifest_path.display(), "manifest written");

    if args.csv {
        let group = driver
            .core()
            .child(ANALYSIS_NAME)
            .and_then(|task| task.core().accumulators());
        if let Some(group) = group {
            let path = args.out.join(format!("{ANALYSIS_NAME}.csv"));
            let rows = export_csv(group, &path)?;
            tracing::info!(path = %path.display(), rows, "histograms exported");
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.succeeded() {
        return Err(format!("run ended in state {}", report.state).into());
    }
    Ok(())
}
