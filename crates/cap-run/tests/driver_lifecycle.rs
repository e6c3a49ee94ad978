use std::cell::RefCell;
use std::rc::Rc;

use cap_config::{Configuration, Scope};
use cap_core::errors::{CapError, ErrorInfo};
use cap_core::status::Status;
use cap_hist::MemoryStore;
use cap_run::{DriverState, IteratorDriver};
use cap_task::{RunContext, Stage, TaskCore};

type Log = Rc<RefCell<Vec<String>>>;

struct Probe {
    core: TaskCore,
    log: Log,
    script: Option<(u64, Status)>,
    executes: u64,
}

impl Probe {
    fn new(parent: &Scope, log: &Log, script: Option<(u64, Status)>) -> Self {
        Self {
            core: TaskCore::new("Probe", "Probe", parent).unwrap(),
            log: Rc::clone(log),
            script,
            executes: 0,
        }
    }

    fn record(&self, phase: &str) {
        self.log.borrow_mut().push(phase.to_owned());
    }
}

impl Stage for Probe {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn initialize(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        self.record("initialize");
        Ok(())
    }

    fn execute(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        self.executes += 1;
        self.record("execute");
        match self.script {
            Some((at, status)) if at == self.executes => {
                let info = ErrorInfo::new("probe", "scripted status");
                match status {
                    Status::Error => return Err(CapError::Task(info)),
                    Status::Fatal => return Err(CapError::Fatal(info)),
                    other => ctx.post(other, self.core.site("execute"), "scripted status"),
                }
            }
            _ => self.core.counters_mut().increment_processed(),
        }
        Ok(())
    }

    fn finalize(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        self.record("finalize");
        Ok(())
    }

    fn reset(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        self.record("reset");
        self.core.reset();
        Ok(())
    }

    fn save_partial(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        self.record("savePartial");
        self.core.save_partial(ctx)
    }

    fn subsample_analysis(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        self.record("subsampleAnalysis");
        Ok(())
    }
}

struct Setup {
    driver: IteratorDriver,
    log: Log,
    ctx: RunContext,
}

fn setup(params: &[(&str, cap_config::ParamValue)], script: Option<(u64, Status)>) -> Setup {
    let log = Log::default();
    let mut driver = IteratorDriver::new("Run").unwrap();
    let probe = Probe::new(driver.scope(), &log, script);
    driver.add_task(Box::new(probe)).unwrap();

    let mut requested = Configuration::new();
    for (name, value) in params {
        requested.set_parameter(&Scope::root(), name, value.clone());
    }
    let config = driver.configuration(&requested).unwrap();
    Setup {
        driver,
        log,
        ctx: RunContext::new(config, Box::new(MemoryStore::new())),
    }
}

fn count(log: &Log, phase: &str) -> usize {
    log.borrow().iter().filter(|entry| entry.as_str() == phase).count()
}

fn probe(driver: &IteratorDriver) -> &TaskCore {
    driver.core().child("Probe").unwrap().core()
}

#[test]
fn runs_requested_iterations_then_finalizes() {
    let mut s = setup(
        &[
            ("nIterationRequested", 5_i32.into()),
            ("nIterationReported", 2_i32.into()),
        ],
        None,
    );

    let report = s.driver.run(&mut s.ctx).unwrap();

    assert!(report.succeeded());
    assert_eq!(report.state, DriverState::Done);
    assert_eq!(report.iterations_requested, 5);
    assert_eq!(report.iterations_completed, 5);
    assert_eq!(report.events_processed, 5);
    assert_eq!(report.partial_saves, 0);
    assert_eq!(report.final_status, Status::Ok);
    assert_eq!(count(&s.log, "initialize"), 1);
    assert_eq!(count(&s.log, "execute"), 5);
    assert_eq!(count(&s.log, "finalize"), 1);
    assert_eq!(count(&s.log, "savePartial"), 0);
    assert_eq!(s.log.borrow().last().map(String::as_str), Some("finalize"));
}

#[test]
fn subsample_mode_saves_then_resets_every_interval() {
    let mut s = setup(
        &[
            ("nIterationRequested", 6_i32.into()),
            ("nIterationPartialSave", 2_i32.into()),
            ("doPartialSave", true.into()),
            ("doSubsampleAnalysis", true.into()),
        ],
        None,
    );

    let report = s.driver.run(&mut s.ctx).unwrap();

    assert_eq!(report.partial_saves, 3);
    assert_eq!(count(&s.log, "savePartial"), 3);
    assert_eq!(count(&s.log, "reset"), 3);
    assert_eq!(count(&s.log, "subsampleAnalysis"), 1);
    let log = s.log.borrow();
    assert_eq!(
        log[1..5].to_vec(),
        vec!["execute", "execute", "savePartial", "reset"]
    );
    assert_eq!(log.last().map(String::as_str), Some("subsampleAnalysis"));
    drop(log);

    let counters = probe(&s.driver).counters();
    assert_eq!(counters.processed, 0);
    assert_eq!(counters.total_since_start, 6);
}

#[test]
fn partial_saves_without_subsample_keep_accumulating() {
    let mut s = setup(
        &[
            ("nIterationRequested", 5_i32.into()),
            ("nIterationPartialSave", 2_i32.into()),
            ("doPartialSave", true.into()),
        ],
        None,
    );

    let report = s.driver.run(&mut s.ctx).unwrap();

    assert_eq!(report.partial_saves, 2);
    assert_eq!(count(&s.log, "reset"), 0);
    assert_eq!(count(&s.log, "subsampleAnalysis"), 0);
    assert_eq!(probe(&s.driver).counters().processed, 5);
}

#[test]
fn end_of_data_stops_the_loop_and_still_finalizes() {
    let mut s = setup(
        &[("nIterationRequested", 10_i32.into())],
        Some((4, Status::EndOfData)),
    );

    let report = s.driver.run(&mut s.ctx).unwrap();

    assert_eq!(report.state, DriverState::Done);
    assert!(report.ended_early);
    assert_eq!(report.iterations_completed, 3);
    assert_eq!(report.events_processed, 3);
    assert_eq!(report.final_status, Status::Ok);
    assert_eq!(count(&s.log, "execute"), 4);
    assert_eq!(count(&s.log, "finalize"), 1);
}

#[test]
fn error_during_execute_fails_without_finalize() {
    let mut s = setup(&[("nIterationRequested", 10_i32.into())], Some((2, Status::Error)));

    let report = s.driver.run(&mut s.ctx).unwrap();

    assert_eq!(report.state, DriverState::Failed);
    assert!(!report.succeeded());
    assert_eq!(report.iterations_completed, 1);
    assert_eq!(report.final_status, Status::Error);
    assert_eq!(report.last_report.unwrap().site.instance, "Run/Probe");
    assert_eq!(count(&s.log, "finalize"), 0);
}

#[test]
fn fatal_is_returned_as_an_error() {
    let mut s = setup(&[("nIterationRequested", 10_i32.into())], Some((3, Status::Fatal)));

    let err = s.driver.run(&mut s.ctx).unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(err.info().code, "driver-fatal");
    assert_eq!(s.driver.state(), DriverState::Failed);
    assert_eq!(s.driver.iterations(), 2);
    assert_eq!(count(&s.log, "finalize"), 0);
}

#[test]
fn warnings_do_not_stop_the_run() {
    let mut s = setup(&[("nIterationRequested", 4_i32.into())], Some((2, Status::Warning)));

    let report = s.driver.run(&mut s.ctx).unwrap();

    assert_eq!(report.state, DriverState::Done);
    assert_eq!(report.iterations_completed, 4);
    assert_eq!(report.final_status, Status::Warning);
}

#[test]
fn subsample_without_partial_saves_is_rejected() {
    let mut s = setup(
        &[
            ("nIterationRequested", 4_i32.into()),
            ("doSubsampleAnalysis", true.into()),
        ],
        None,
    );

    let err = s.driver.run(&mut s.ctx).unwrap_err();

    assert_eq!(err.info().code, "driver-subsample-without-partials");
    assert_eq!(s.driver.state(), DriverState::Init);
    assert!(s.log.borrow().is_empty());
}

#[test]
fn negative_iteration_count_is_rejected() {
    let mut s = setup(&[("nIterationRequested", (-1_i32).into())], None);

    let err = s.driver.run(&mut s.ctx).unwrap_err();

    assert_eq!(err.info().code, "driver-negative");
}
