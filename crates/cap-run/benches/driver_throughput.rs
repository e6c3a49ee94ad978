use cap_config::{Configuration, Scope, ScopedView};
use cap_core::errors::CapError;
use cap_hist::{AccumulatorGroup, Histogram, MemoryStore};
use cap_run::IteratorDriver;
use cap_task::{
    AcceptAll, Analysis, AnalysisTask, EventReader, FilterSet, FnFilter, ReadOutcome, RunContext,
    SourceTask,
};
use criterion::{criterion_group, criterion_main, Criterion};

struct Sawtooth {
    step: u64,
}

impl EventReader<f64> for Sawtooth {
    fn read_next(&mut self, buffer: &mut f64) -> Result<ReadOutcome, CapError> {
        self.step += 1;
        *buffer = (self.step % 100) as f64 / 10.0;
        Ok(ReadOutcome::Event)
    }
}

struct Spectrum;

impl Analysis for Spectrum {
    type Event = f64;

    fn book(
        &mut self,
        group: &mut AccumulatorGroup,
        category: usize,
        label: &str,
        _params: ScopedView<'_>,
    ) -> Result<(), CapError> {
        group.book(Histogram::new_1d(format!("{label}_x"), category, 50, 0.0, 10.0)?)
    }

    fn fill(
        &mut self,
        group: &mut AccumulatorGroup,
        _category: usize,
        label: &str,
        event: &f64,
    ) -> Result<(), CapError> {
        group.fill(&format!("{label}_x"), &[*event], 1.0)
    }
}

fn build(iterations: i32, partial_every: i32) -> (IteratorDriver, RunContext) {
    let mut driver = IteratorDriver::new("Run").unwrap();
    let source: SourceTask<Sawtooth, f64> =
        SourceTask::new("Source", driver.scope(), Sawtooth { step: 0 }).unwrap();
    let filters: FilterSet<f64> = FilterSet::new()
        .with(AcceptAll::new("All"))
        .with(FnFilter::new("Tail", |x: &f64| *x > 5.0));
    let buffer = source.buffer();
    let analysis = AnalysisTask::new("Spectrum", driver.scope(), Spectrum, filters, buffer).unwrap();
    driver.add_task(Box::new(source)).unwrap();
    driver.add_task(Box::new(analysis)).unwrap();

    let root = Scope::root();
    let mut requested = Configuration::new();
    requested.set_parameter(&root, "nIterationRequested", iterations);
    requested.set_parameter(&root, "doSaveHistograms", false);
    if partial_every > 0 {
        requested.set_parameter(&root, "doPartialSave", true);
        requested.set_parameter(&root, "doSubsampleAnalysis", true);
        requested.set_parameter(&root, "nIterationPartialSave", partial_every);
    }
    let config = driver.configuration(&requested).unwrap();
    (driver, RunContext::new(config, Box::new(MemoryStore::new())))
}

fn bench_driver(c: &mut Criterion) {
    c.bench_function("driver_10k_iterations", |b| {
        b.iter(|| {
            let (mut driver, mut ctx) = build(10_000, 0);
            let _ = driver.run(&mut ctx).unwrap();
        })
    });
    c.bench_function("driver_10k_iterations_subsample", |b| {
        b.iter(|| {
            let (mut driver, mut ctx) = build(10_000, 1_000);
            let _ = driver.run(&mut ctx).unwrap();
        })
    });
}

criterion_group!(benches, bench_driver);
criterion_main!(benches);
