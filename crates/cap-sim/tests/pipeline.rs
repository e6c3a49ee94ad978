use std::path::Path;

use cap_config::{Configuration, ParamValue, Scope};
use cap_hist::{GroupState, JsonFileStore};
use cap_run::{DriverState, IteratorDriver, RunReport};
use cap_sim::{build_pipeline, seed_parameter, PipelineOptions, ANALYSIS_NAME};
use cap_task::{RunContext, Stage};
use tempfile::tempdir;

fn run(
    options: PipelineOptions,
    dir: &Path,
    params: &[(&str, &str, ParamValue)],
) -> (IteratorDriver, RunReport) {
    let mut driver = build_pipeline(options).unwrap();
    let mut requested = Configuration::new();
    requested.set_parameter(&Scope::root(), "histoOutputPath", dir.to_string_lossy().into_owned());
    for (path, name, value) in params {
        let scope = Scope::from_path(path).unwrap();
        requested.set_parameter(&scope, name, value.clone());
    }
    let config = driver.configuration(&requested).unwrap();
    let mut ctx = RunContext::new(config, Box::new(JsonFileStore::new()));
    let report = driver.run(&mut ctx).unwrap();
    (driver, report)
}

fn pt_contents(driver: &IteratorDriver) -> Vec<f64> {
    driver
        .core()
        .child(ANALYSIS_NAME)
        .unwrap()
        .core()
        .accumulators()
        .unwrap()
        .get("Spectra_All_pt")
        .unwrap()
        .contents()
        .to_vec()
}

#[test]
fn toy_run_fills_both_categories_and_saves() {
    let dir = tempdir().unwrap();
    let (driver, report) = run(
        PipelineOptions::default(),
        dir.path(),
        &[("", "nIterationRequested", ParamValue::Int(200))],
    );

    assert_eq!(report.state, DriverState::Done);
    assert!(report.succeeded());
    assert_eq!(report.iterations_completed, 200);
    assert!(!report.ended_early);

    let spectra = driver.core().child(ANALYSIS_NAME).unwrap().core();
    let counters = spectra.counters();
    assert_eq!(counters.processed, 200);
    assert_eq!(counters.accepted, 200);
    assert_eq!(counters.accepted_by_category[0], 200);
    assert!(counters.accepted_by_category[1] <= 200);
    assert_eq!(spectra.accumulators().unwrap().state(), GroupState::Persisted);
    assert!(dir.path().join("Spectra.json").is_file());
}

#[test]
fn same_seed_reproduces_histograms() {
    let first_dir = tempdir().unwrap();
    let second_dir = tempdir().unwrap();
    let other_dir = tempdir().unwrap();
    let params = [("", "nIterationRequested", ParamValue::Int(100))];

    let (first, _) = run(PipelineOptions::default(), first_dir.path(), &params);
    let (second, _) = run(PipelineOptions::default(), second_dir.path(), &params);
    let other_seed = PipelineOptions {
        seed: 7,
        ..PipelineOptions::default()
    };
    let (other, _) = run(other_seed, other_dir.path(), &params);

    assert_eq!(pt_contents(&first), pt_contents(&second));
    assert_ne!(pt_contents(&first), pt_contents(&other));
}

#[test]
fn limited_generator_ends_the_run_early() {
    let dir = tempdir().unwrap();
    let (driver, report) = run(
        PipelineOptions::default(),
        dir.path(),
        &[
            ("", "nIterationRequested", ParamValue::Int(100)),
            ("Run/Generator", "nEventsAvailable", ParamValue::Int(30)),
        ],
    );

    assert_eq!(report.state, DriverState::Done);
    assert!(report.ended_early);
    assert_eq!(report.iterations_completed, 30);
    let spectra = driver.core().child(ANALYSIS_NAME).unwrap().core();
    assert_eq!(spectra.counters().processed, 30);
    assert!(dir.path().join("Spectra.json").is_file());
}

#[test]
fn invalid_generator_settings_fail_initialization() {
    let dir = tempdir().unwrap();
    let (_, report) = run(
        PipelineOptions::default(),
        dir.path(),
        &[
            ("", "nIterationRequested", ParamValue::Int(10)),
            ("Run/Generator", "ptMean", ParamValue::Double(-1.0)),
        ],
    );

    assert_eq!(report.state, DriverState::Failed);
    assert_eq!(report.iterations_completed, 0);
    let last = report.last_report.unwrap();
    assert!(last.message.contains("invalid generator parameters"));
}

#[test]
fn saved_spectra_reload_in_a_second_run() {
    let dir = tempdir().unwrap();
    let (first, _) = run(
        PipelineOptions::default(),
        dir.path(),
        &[("", "nIterationRequested", ParamValue::Int(200))],
    );

    let (second, report) = run(
        PipelineOptions::default(),
        dir.path(),
        &[
            ("", "nIterationRequested", ParamValue::Int(0)),
            ("", "histoInputPath", ParamValue::Str(dir.path().to_string_lossy().into_owned())),
            ("", "doLoadHistograms", ParamValue::Bool(true)),
        ],
    );

    assert_eq!(report.state, DriverState::Done, "{:?}", report.last_report);
    assert_eq!(pt_contents(&second), pt_contents(&first));
    let spectra = second.core().child(ANALYSIS_NAME).unwrap().core();
    assert_eq!(spectra.counters().processed, 200);
}

#[test]
fn negative_seed_is_rejected() {
    let dir = tempdir().unwrap();
    let (_, report) = run(
        PipelineOptions::default(),
        dir.path(),
        &[
            ("", "nIterationRequested", ParamValue::Int(10)),
            ("Run/Generator", "seed", ParamValue::Int(-1)),
        ],
    );
    assert_eq!(report.state, DriverState::Failed);
    assert!(report.last_report.unwrap().message.contains("generator-seed"));

    let mut config = Configuration::new();
    let generator = Scope::from_path("Run/Generator").unwrap();
    assert_eq!(seed_parameter(config.view(&generator)).unwrap(), None);
    config.set_parameter(&generator, "seed", ParamValue::Long(7_000_000_000));
    assert_eq!(seed_parameter(config.view(&generator)).unwrap(), Some(7_000_000_000));
    config.set_parameter(&generator, "seed", ParamValue::Long(-7_000_000_000));
    let err = seed_parameter(config.view(&generator)).unwrap_err();
    assert_eq!(err.info().code, "generator-seed");
}
