//! Toy collision generator and single-particle spectra analysis.

use cap_config::{ParamValue, ScopedView};
use cap_core::errors::{CapError, ErrorInfo};
use cap_core::rng::RngHandle;
use cap_hist::{AccumulatorGroup, Axis, Histogram};
use cap_task::{Analysis, EventReader, ReadOutcome};
use rand::Rng;

/// One final-state particle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Particle {
    /// Transverse momentum.
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Electric charge, ±1.
    pub charge: i8,
}

/// One generated collision.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collision {
    /// Sequence number, starting at zero.
    pub number: u64,
    /// Final-state particles.
    pub particles: Vec<Particle>,
}

impl Collision {
    /// Number of particles.
    pub fn multiplicity(&self) -> usize {
        self.particles.len()
    }
}

/// Generator knobs resolved when the source opens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorSettings {
    /// Master seed.
    pub seed: u64,
    /// Upper bound of the uniform multiplicity draw.
    pub max_multiplicity: u32,
    /// Mean of the exponential pT spectrum.
    pub pt_mean: f64,
    /// Half-width of the uniform eta range.
    pub eta_max: f64,
    /// Events available before END_OF_DATA; zero means unlimited.
    pub available: u64,
}

impl GeneratorSettings {
    fn from_params(params: ScopedView<'_>, fallback_seed: u64) -> Result<Self, CapError> {
        let seed = seed_parameter(params)?.unwrap_or(fallback_seed);
        let max_multiplicity = params.get_int("maxMultiplicity");
        let pt_mean = params.get_double("ptMean");
        let eta_max = params.get_double("etaMax");
        let available = params.try_long("nEventsAvailable").unwrap_or(0);
        if max_multiplicity < 1 || !(pt_mean > 0.0) || !(eta_max > 0.0) || available < 0 {
            return Err(CapError::Config(
                ErrorInfo::new("generator-settings", "invalid generator parameters")
                    .with_context("scope", params.scope().path())
                    .with_context("maxMultiplicity", max_multiplicity.to_string())
                    .with_context("ptMean", pt_mean.to_string())
                    .with_context("etaMax", eta_max.to_string())
                    .with_context("nEventsAvailable", available.to_string()),
            ));
        }
        Ok(Self {
            seed,
            max_multiplicity: max_multiplicity as u32,
            pt_mean,
            eta_max,
            available: available as u64,
        })
    }
}

/// The `seed` parameter visible from `params`, if set. Negative seeds are rejected.
pub fn seed_parameter(params: ScopedView<'_>) -> Result<Option<u64>, CapError> {
    params
        .try_long("seed")
        .map(|seed| {
            u64::try_from(seed).map_err(|_| {
                CapError::Config(
                    ErrorInfo::new("generator-seed", "seed must not be negative")
                        .with_context("scope", params.scope().path())
                        .with_context("seed", seed.to_string()),
                )
            })
        })
        .transpose()
}

const GENERATOR_STREAM: u64 = 1;

/// Event source producing uncorrelated particles with an exponential pT
/// spectrum and flat eta.
#[derive(Debug)]
pub struct CollisionGenerator {
    fallback_seed: u64,
    settings: Option<GeneratorSettings>,
    rng: RngHandle,
    produced: u64,
}

impl CollisionGenerator {
    /// Creates a generator seeded with `seed` unless the `seed` parameter overrides it.
    pub fn new(seed: u64) -> Self {
        Self {
            fallback_seed: seed,
            settings: None,
            rng: RngHandle::substream(seed, GENERATOR_STREAM),
            produced: 0,
        }
    }

    /// Settings in effect once opened.
    pub fn settings(&self) -> Option<&GeneratorSettings> {
        self.settings.as_ref()
    }

    /// Events produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }
}

impl EventReader<Collision> for CollisionGenerator {
    fn defaults(&self) -> Vec<(&'static str, ParamValue)> {
        vec![
            ("maxMultiplicity", ParamValue::Int(20)),
            ("ptMean", ParamValue::Double(1.0)),
            ("etaMax", ParamValue::Double(1.0)),
            ("nEventsAvailable", ParamValue::Int(0)),
        ]
    }

    fn open(&mut self, params: ScopedView<'_>) -> Result<(), CapError> {
        let settings = GeneratorSettings::from_params(params, self.fallback_seed)?;
        self.rng = RngHandle::substream(settings.seed, GENERATOR_STREAM);
        self.settings = Some(settings);
        self.produced = 0;
        tracing::debug!(
            scope = params.scope().path(),
            seed = settings.seed,
            available = settings.available,
            "generator opened"
        );
        Ok(())
    }

    fn read_next(&mut self, buffer: &mut Collision) -> Result<ReadOutcome, CapError> {
        let settings = self.settings.ok_or_else(|| {
            CapError::Task(ErrorInfo::new("generator-closed", "generator read before open"))
        })?;
        if settings.available > 0 && self.produced >= settings.available {
            return Ok(ReadOutcome::EndOfData);
        }
        let multiplicity = self.rng.inner_mut().gen_range(1..=settings.max_multiplicity);
        buffer.number = self.produced;
        buffer.particles.clear();
        for _ in 0..multiplicity {
            let pt = self.rng.exponential(settings.pt_mean);
            let eta = self.rng.uniform(-settings.eta_max, settings.eta_max);
            let charge = if self.rng.inner_mut().gen_bool(0.5) { 1 } else { -1 };
            buffer.particles.push(Particle { pt, eta, charge });
        }
        self.produced += 1;
        Ok(ReadOutcome::Event)
    }
}

/// Single-particle spectra: pT, eta, pT vs eta and multiplicity per category.
#[derive(Debug, Default)]
pub struct ParticleSpectra;

impl ParticleSpectra {
    fn name(label: &str, observable: &str) -> String {
        format!("{label}_{observable}")
    }
}

impl Analysis for ParticleSpectra {
    type Event = Collision;

    fn defaults(&self) -> Vec<(&'static str, ParamValue)> {
        vec![
            ("nBinsPt", ParamValue::Int(40)),
            ("ptMax", ParamValue::Double(5.0)),
            ("nBinsEta", ParamValue::Int(20)),
            ("etaRange", ParamValue::Double(1.0)),
            ("nBinsMult", ParamValue::Int(25)),
            ("multMax", ParamValue::Double(50.0)),
        ]
    }

    fn book(
        &mut self,
        group: &mut AccumulatorGroup,
        category: usize,
        label: &str,
        params: ScopedView<'_>,
    ) -> Result<(), CapError> {
        let bins = |name: &str| params.get_int(name).max(1) as usize;
        let eta_range = params.get_double("etaRange");
        let pt = Axis::new(bins("nBinsPt"), 0.0, params.get_double("ptMax"))?.with_label("pT");
        let eta = Axis::new(bins("nBinsEta"), -eta_range, eta_range)?.with_label("eta");
        let mult =
            Axis::new(bins("nBinsMult"), 0.0, params.get_double("multMax"))?.with_label("n");
        group.book(Histogram::new(Self::name(label, "pt"), category, vec![pt.clone()])?)?;
        group.book(Histogram::new(Self::name(label, "eta"), category, vec![eta.clone()])?)?;
        group.book(Histogram::new(Self::name(label, "mult"), category, vec![mult])?)?;
        group.book(Histogram::new(Self::name(label, "ptEta"), category, vec![pt, eta])?)
    }

    fn fill(
        &mut self,
        group: &mut AccumulatorGroup,
        _category: usize,
        label: &str,
        event: &Collision,
    ) -> Result<(), CapError> {
        let pt_name = Self::name(label, "pt");
        let eta_name = Self::name(label, "eta");
        let pt_eta_name = Self::name(label, "ptEta");
        group.fill(
            &Self::name(label, "mult"),
            &[event.multiplicity() as f64],
            1.0,
        )?;
        for particle in &event.particles {
            group.fill(&pt_name, &[particle.pt], 1.0)?;
            group.fill(&eta_name, &[particle.eta], 1.0)?;
            group.fill(&pt_eta_name, &[particle.pt, particle.eta], 1.0)?;
        }
        Ok(())
    }
}
