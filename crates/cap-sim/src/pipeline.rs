//! Wiring of the toy run: a generator and a spectra analysis under one driver.

use cap_core::errors::CapError;
use cap_run::IteratorDriver;
use cap_task::{AcceptAll, AnalysisTask, FilterSet, FnFilter, SourceTask};

use crate::toy::{Collision, CollisionGenerator, ParticleSpectra};

/// Name of the driver task.
pub const DRIVER_NAME: &str = "Run";
/// Name of the event source task.
pub const SOURCE_NAME: &str = "Generator";
/// Name of the analysis task, also the stem of its output documents.
pub const ANALYSIS_NAME: &str = "Spectra";

/// Pipeline shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Seed used when the configuration sets none.
    pub seed: u64,
    /// Multiplicity at or above which an event falls in the `HighMult` category.
    pub high_multiplicity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            high_multiplicity: 10,
        }
    }
}

/// Builds `Run -> [Generator, Spectra]`; Spectra books one set of histograms
/// for all events and one for high-multiplicity events.
pub fn build_pipeline(options: PipelineOptions) -> Result<IteratorDriver, CapError> {
    let mut driver = IteratorDriver::new(DRIVER_NAME)?;
    let source: SourceTask<CollisionGenerator, Collision> = SourceTask::new(
        SOURCE_NAME,
        driver.scope(),
        CollisionGenerator::new(options.seed),
    )?;
    let threshold = options.high_multiplicity;
    let filters: FilterSet<Collision> = FilterSet::new()
        .with(AcceptAll::new("All"))
        .with(FnFilter::new("HighMult", move |event: &Collision| {
            event.multiplicity() >= threshold
        }));
    let analysis = AnalysisTask::new(
        ANALYSIS_NAME,
        driver.scope(),
        ParticleSpectra,
        filters,
        source.buffer(),
    )?;
    driver.add_task(Box::new(source))?;
    driver.add_task(Box::new(analysis))?;
    Ok(driver)
}
