use std::error::Error;
use std::path::PathBuf;

use cap_hist::{JsonFileStore, Normalization, SubsampleOptions};
use cap_sim::{aggregate_directory, export_csv, write_subsample, ANALYSIS_NAME};
use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum NormalizationArg {
    /// Average raw bin contents.
    None,
    /// Divide each snapshot by its accepted count per category first.
    ByAccepted,
}

impl From<NormalizationArg> for Normalization {
    fn from(arg: NormalizationArg) -> Self {
        match arg {
            NormalizationArg::None => Normalization::None,
            NormalizationArg::ByAccepted => Normalization::ByAccepted,
        }
    }
}

#[derive(Args, Debug)]
pub struct SubsampleArgs {
    /// Directory holding `<stem>_PartNNN.json` documents.
    #[arg(long)]
    pub dir: PathBuf,
    /// File stem of the partial saves.
    #[arg(long, default_value = ANALYSIS_NAME)]
    pub stem: String,
    /// Accumulator group to aggregate; defaults to the stem.
    #[arg(long)]
    pub group: Option<String>,
    /// Per-snapshot normalization.
    #[arg(long, value_enum, default_value_t = NormalizationArg::ByAccepted)]
    pub normalization: NormalizationArg,
    /// Also write the aggregated bins as CSV.
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

pub fn run(args: &SubsampleArgs) -> Result<(), Box<dyn Error>> {
    let store = JsonFileStore::new();
    let group = args.group.as_deref().unwrap_or(&args.stem);
    let options = SubsampleOptions {
        normalization: args.normalization.into(),
    };
    let result = aggregate_directory(&store, &args.dir, &args.stem, group, &options)?;
    for warning in &result.warnings {
        tracing::warn!(group, "{warning}");
    }
    let path = write_subsample(&store, &args.dir, &args.stem, &result)?;
    println!(
        "aggregated {} partial saves of {} into {}",
        result.samples,
        group,
        path.display()
    );
    if let Some(csv) = &args.csv {
        let rows = export_csv(&result.group, csv)?;
        println!("wrote {rows} rows to {}", csv.display());
    }
    Ok(())
}
