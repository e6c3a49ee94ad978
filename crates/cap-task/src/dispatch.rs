//! Recursive phase dispatch and configuration over a task tree.

use cap_config::Configuration;
use cap_core::errors::{CapError, ErrorInfo};
use cap_core::status::Status;

use crate::context::RunContext;
use crate::stage::{Phase, Stage};

/// Dispatches `phase` to `stage` and then, in insertion order, to its children.
///
/// Nothing runs while the status gates dispatch. A failing hook posts its
/// status; visiting stops as soon as the status gates dispatch, leaving later
/// siblings untouched and earlier work in place.
pub fn dispatch(stage: &mut dyn Stage, phase: Phase, ctx: &mut RunContext) -> Status {
    if !ctx.allows_dispatch() {
        return ctx.status();
    }
    if let Err(error) = run_hook(stage, phase, ctx) {
        let site = stage.core().site(phase.as_str());
        ctx.post_error(site, &error);
    }
    for child in stage.core_mut().children_mut() {
        if !ctx.allows_dispatch() {
            break;
        }
        dispatch(child.as_mut(), phase, ctx);
    }
    ctx.status()
}

fn run_hook(stage: &mut dyn Stage, phase: Phase, ctx: &mut RunContext) -> Result<(), CapError> {
    match phase {
        Phase::Initialize => {
            if stage.core().is_initialized() {
                return Err(CapError::Task(
                    ErrorInfo::new("task-reinitialize", "initialize dispatched twice")
                        .with_context("task", stage.core().scope().path()),
                ));
            }
            stage.core_mut().mark_initialized();
            stage.initialize(ctx)
        }
        Phase::Execute => stage.execute(ctx),
        Phase::Finalize => stage.finalize(ctx),
        Phase::Reset => stage.reset(ctx),
        Phase::Clear => stage.clear(ctx),
        Phase::SavePartial => stage.save_partial(ctx),
        Phase::SubsampleAnalysis => stage.subsample_analysis(ctx),
    }
}

/// Merges every stage's defaults at its scope, tree order, then applies
/// `requested`. Running it again on its own output changes nothing.
pub fn configure(
    stage: &dyn Stage,
    config: &mut Configuration,
    requested: &Configuration,
) -> Result<(), CapError> {
    merge_defaults(stage, config)?;
    config.apply_overrides(requested);
    Ok(())
}

fn merge_defaults(stage: &dyn Stage, config: &mut Configuration) -> Result<(), CapError> {
    stage.define_defaults(config)?;
    for child in stage.core().children() {
        merge_defaults(child.as_ref(), config)?;
    }
    Ok(())
}
