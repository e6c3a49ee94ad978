//! Lifecycle hooks implemented by every node of the task tree.

use std::fmt::{self, Display};

use cap_config::Configuration;
use cap_core::errors::CapError;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::task::TaskCore;

/// Phases the dispatcher can fan out over a task tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// One-time setup.
    Initialize,
    /// Per-event work.
    Execute,
    /// End-of-run work.
    Finalize,
    /// Zero transient state.
    Reset,
    /// Release accumulators.
    Clear,
    /// Persist a subsample snapshot.
    SavePartial,
    /// Combine subsample snapshots.
    SubsampleAnalysis,
}

impl Phase {
    /// Every phase, in lifecycle order.
    pub const ALL: [Phase; 7] = [
        Phase::Initialize,
        Phase::Execute,
        Phase::Finalize,
        Phase::Reset,
        Phase::Clear,
        Phase::SavePartial,
        Phase::SubsampleAnalysis,
    ];

    /// Stable camelCase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Initialize => "initialize",
            Phase::Execute => "execute",
            Phase::Finalize => "finalize",
            Phase::Reset => "reset",
            Phase::Clear => "clear",
            Phase::SavePartial => "savePartial",
            Phase::SubsampleAnalysis => "subsampleAnalysis",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the task tree.
///
/// Hooks only do this node's local work; the dispatcher visits children.
/// A hook returning `Err` posts the error's status on the run; hooks may also
/// post non-failure statuses (warnings, end of input) through the context.
pub trait Stage {
    /// Shared task state.
    fn core(&self) -> &TaskCore;

    /// Mutable shared task state.
    fn core_mut(&mut self) -> &mut TaskCore;

    /// Merges this stage's default parameters at its scope.
    fn define_defaults(&self, _config: &mut Configuration) -> Result<(), CapError> {
        Ok(())
    }

    /// One-time setup.
    fn initialize(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        Ok(())
    }

    /// Per-event work. Counts the event by default.
    fn execute(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        self.core_mut().counters_mut().increment_processed();
        Ok(())
    }

    /// End-of-run work.
    fn finalize(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        Ok(())
    }

    /// Zeroes bins and transient counters.
    fn reset(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        self.core_mut().reset();
        Ok(())
    }

    /// Releases owned accumulators.
    fn clear(&mut self, _ctx: &mut RunContext) -> Result<(), CapError> {
        self.core_mut().clear();
        Ok(())
    }

    /// Persists the accumulators under the next partial index.
    fn save_partial(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        self.core_mut().save_partial(ctx)
    }

    /// Aggregates this task's partial saves.
    fn subsample_analysis(&mut self, ctx: &mut RunContext) -> Result<(), CapError> {
        self.core_mut().subsample_analysis(ctx)
    }
}
