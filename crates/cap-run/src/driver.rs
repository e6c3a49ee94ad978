//! Iterator driver: runs the lifecycle over a task tree for N iterations.

use std::fmt::{self, Display};

use cap_config::{Configuration, Scope};
use cap_core::errors::{CapError, ErrorInfo};
use cap_core::status::Status;
use cap_task::workflow::{PARAM_DO_PARTIAL_SAVE, PARAM_DO_SUBSAMPLE};
use cap_task::{configure, dispatch, Phase, RunContext, Stage, TaskCore};
use serde::{Deserialize, Serialize};

use crate::report::RunReport;

/// Iterations to run.
pub const PARAM_REQUESTED: &str = "nIterationRequested";
/// Iterations between progress markers; zero disables them.
pub const PARAM_REPORTED: &str = "nIterationReported";
/// Iterations between partial saves.
pub const PARAM_PARTIAL_SAVE: &str = "nIterationPartialSave";

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverState {
    /// Built, not yet run.
    #[default]
    Init,
    /// Inside the event loop.
    Running,
    /// Dispatching finalize and subsample analysis.
    Finalizing,
    /// Completed.
    Done,
    /// Stopped on ERROR or FATAL.
    Failed,
}

impl Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DriverState::Init => "INIT",
            DriverState::Running => "RUNNING",
            DriverState::Finalizing => "FINALIZING",
            DriverState::Done => "DONE",
            DriverState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Loop parameters resolved at the driver's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Iterations to run.
    pub requested: u64,
    /// Progress marker interval; zero disables markers.
    pub reported: u64,
    /// Partial-save interval.
    pub partial_save_every: u64,
    /// Checkpoint every `partial_save_every` iterations.
    pub do_partial_save: bool,
    /// Reset after each checkpoint and aggregate at the end.
    pub do_subsample: bool,
}

impl DriverSettings {
    /// Resolves and validates the loop parameters visible from `scope`.
    pub fn resolve(config: &Configuration, scope: &Scope) -> Result<Self, CapError> {
        let view = config.view(scope);
        let requested = non_negative(PARAM_REQUESTED, view.try_long(PARAM_REQUESTED).unwrap_or(0))?;
        let reported = non_negative(PARAM_REPORTED, view.try_long(PARAM_REPORTED).unwrap_or(0))?;
        let partial_save_every = non_negative(
            PARAM_PARTIAL_SAVE,
            view.try_long(PARAM_PARTIAL_SAVE).unwrap_or(0),
        )?;
        let settings = Self {
            requested,
            reported,
            partial_save_every,
            do_partial_save: view.get_bool(PARAM_DO_PARTIAL_SAVE),
            do_subsample: view.get_bool(PARAM_DO_SUBSAMPLE),
        };
        if settings.do_partial_save && settings.partial_save_every == 0 {
            return Err(CapError::Config(
                ErrorInfo::new("driver-partial-interval", "partial saves need a positive interval")
                    .with_context("scope", scope.path())
                    .with_hint("set nIterationPartialSave > 0"),
            ));
        }
        if settings.do_subsample && !settings.do_partial_save {
            return Err(CapError::Config(
                ErrorInfo::new(
                    "driver-subsample-without-partials",
                    "subsample analysis needs partial saves",
                )
                .with_context("scope", scope.path())
                .with_hint("set doPartialSave: true"),
            ));
        }
        Ok(settings)
    }

    fn checkpoint_due(&self, iteration: u64) -> bool {
        self.do_partial_save && iteration % self.partial_save_every == 0
    }

    fn progress_due(&self, iteration: u64) -> bool {
        self.reported > 0 && iteration % self.reported == 0
    }
}

fn non_negative(name: &str, value: i64) -> Result<u64, CapError> {
    u64::try_from(value).map_err(|_| {
        CapError::Config(
            ErrorInfo::new("driver-negative", "parameter must not be negative")
                .with_context("name", name)
                .with_context("value", value.to_string()),
        )
    })
}

/// Top of the task tree; owns the event loop.
pub struct IteratorDriver {
    core: TaskCore,
    state: DriverState,
    iterations: u64,
    partial_saves: u32,
    ended_early: bool,
}

impl IteratorDriver {
    /// Creates a driver called `name` directly below the configuration root.
    pub fn new(name: &str) -> Result<Self, CapError> {
        Ok(Self {
            core: TaskCore::top_level("IteratorDriver", name)?,
            state: DriverState::Init,
            iterations: 0,
            partial_saves: 0,
            ended_early: false,
        })
    }

    /// Scope children must be built under.
    pub fn scope(&self) -> &Scope {
        self.core.scope()
    }

    /// Appends a task; tasks execute in insertion order.
    pub fn add_task(&mut self, task: Box<dyn Stage>) -> Result<(), CapError> {
        self.core.add_child(task)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Iterations completed by the last run.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Merges every task's defaults with `requested` into a fresh configuration.
    pub fn configuration(&self, requested: &Configuration) -> Result<Configuration, CapError> {
        let mut config = Configuration::with_strictness(requested.strictness());
        configure(self, &mut config, requested)?;
        Ok(config)
    }

    /// Runs `nIterationRequested` iterations.
    pub fn run(&mut self, ctx: &mut RunContext) -> Result<RunReport, CapError> {
        let settings = DriverSettings::resolve(ctx.config(), self.core.scope())?;
        self.run_with(&settings, ctx)
    }

    /// Runs with explicit loop settings.
    ///
    /// END_OF_DATA and END_OF_FILE end the loop early and finalize still runs.
    /// ERROR stops the run with a FAILED report; FATAL is returned as an error.
    pub fn run_with(
        &mut self,
        settings: &DriverSettings,
        ctx: &mut RunContext,
    ) -> Result<RunReport, CapError> {
        self.state = DriverState::Init;
        self.iterations = 0;
        self.partial_saves = 0;
        self.ended_early = false;
        tracing::info!(
            driver = self.core.scope().path(),
            requested = settings.requested,
            partial_save_every = settings.partial_save_every,
            do_partial_save = settings.do_partial_save,
            do_subsample = settings.do_subsample,
            "run starting"
        );

        dispatch(self, Phase::Initialize, ctx);
        if !ctx.allows_dispatch() {
            return self.fail(settings, ctx);
        }

        self.state = DriverState::Running;
        for iteration in 1..=settings.requested {
            let status = dispatch(self, Phase::Execute, ctx);
            if status.is_end_of_input() {
                tracing::info!(
                    driver = self.core.scope().path(),
                    completed = self.iterations,
                    status = %status,
                    "input exhausted, finalizing"
                );
                self.ended_early = true;
                ctx.reset_to_ok();
                break;
            }
            if !status.allows_dispatch() {
                return self.fail(settings, ctx);
            }
            self.iterations = iteration;
            self.core.counters_mut().increment_processed();
            if settings.progress_due(iteration) {
                tracing::info!(
                    driver = self.core.scope().path(),
                    iteration,
                    requested = settings.requested,
                    "progress"
                );
            }
            if settings.checkpoint_due(iteration) {
                self.checkpoint(settings, ctx);
                if !ctx.allows_dispatch() {
                    return self.fail(settings, ctx);
                }
            }
        }

        self.state = DriverState::Finalizing;
        dispatch(self, Phase::Finalize, ctx);
        if !ctx.allows_dispatch() {
            return self.fail(settings, ctx);
        }
        if settings.do_subsample {
            dispatch(self, Phase::SubsampleAnalysis, ctx);
            if !ctx.allows_dispatch() {
                return self.fail(settings, ctx);
            }
        }

        self.state = DriverState::Done;
        tracing::info!(
            driver = self.core.scope().path(),
            iterations = self.iterations,
            partial_saves = self.partial_saves,
            status = %ctx.status(),
            "run finished"
        );
        Ok(self.report(settings, ctx))
    }

    fn checkpoint(&mut self, settings: &DriverSettings, ctx: &mut RunContext) {
        dispatch(self, Phase::SavePartial, ctx);
        if !ctx.allows_dispatch() {
            return;
        }
        self.partial_saves += 1;
        if settings.do_subsample {
            dispatch(self, Phase::Reset, ctx);
            if ctx.allows_dispatch() {
                ctx.reset_to_ok();
            }
        }
    }

    fn fail(
        &mut self,
        settings: &DriverSettings,
        ctx: &mut RunContext,
    ) -> Result<RunReport, CapError> {
        self.state = DriverState::Failed;
        let report = self.report(settings, ctx);
        tracing::error!(
            driver = self.core.scope().path(),
            iterations = self.iterations,
            status = %report.final_status,
            "run failed"
        );
        if report.final_status == Status::Fatal {
            let mut info = ErrorInfo::new("driver-fatal", "run terminated on FATAL status")
                .with_context("driver", self.core.scope().path())
                .with_context("iterations", self.iterations.to_string());
            if let Some(last) = ctx.last_report() {
                info = info
                    .with_context("site", last.site.to_string())
                    .with_context("message", last.message.clone());
            }
            return Err(CapError::Fatal(info));
        }
        Ok(report)
    }

    fn report(&self, settings: &DriverSettings, ctx: &RunContext) -> RunReport {
        RunReport {
            driver: self.core.scope().path().to_owned(),
            state: self.state,
            iterations_requested: settings.requested,
            iterations_completed: self.iterations,
            events_processed: self.core.counters().total_since_start,
            partial_saves: self.partial_saves,
            ended_early: self.ended_early,
            final_status: ctx.status(),
            last_report: ctx.last_report().cloned(),
        }
    }
}

impl Stage for IteratorDriver {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn define_defaults(&self, config: &mut Configuration) -> Result<(), CapError> {
        let root = Scope::root();
        config.merge_default(&root, PARAM_REQUESTED, 0_i32);
        config.merge_default(&root, PARAM_REPORTED, 0_i32);
        config.merge_default(&root, PARAM_PARTIAL_SAVE, 0_i32);
        config.merge_default(&root, PARAM_DO_PARTIAL_SAVE, false);
        config.merge_default(&root, PARAM_DO_SUBSAMPLE, false);
        Ok(())
    }

    fn execute(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        Ok(())
    }
}

impl fmt::Debug for IteratorDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IteratorDriver")
            .field("core", &self.core)
            .field("state", &self.state)
            .field("iterations", &self.iterations)
            .finish()
    }
}
