#![deny(missing_docs)]
#![doc = "Toy collision pipeline for the CAP engine plus the offline helpers used by the `cap-sim` command line."]

pub mod export;
pub mod overrides;
pub mod pipeline;
pub mod toy;

pub use export::{aggregate_directory, discover_partials, export_csv, write_subsample};
pub use overrides::{apply_overrides, parse_override, Override};
pub use pipeline::{build_pipeline, PipelineOptions, ANALYSIS_NAME, DRIVER_NAME, SOURCE_NAME};
pub use toy::{
    seed_parameter, Collision, CollisionGenerator, GeneratorSettings, Particle, ParticleSpectra,
};
