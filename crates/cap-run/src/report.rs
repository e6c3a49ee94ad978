use cap_core::status::{Status, StatusReport};
use serde::{Deserialize, Serialize};

use crate::driver::DriverState;

/// Summary of one driver run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Path of the driver.
    pub driver: String,
    /// State the driver ended in.
    pub state: DriverState,
    /// Iterations asked for.
    pub iterations_requested: u64,
    /// Iterations whose execute dispatch completed.
    pub iterations_completed: u64,
    /// Events counted by the driver since construction.
    pub events_processed: u64,
    /// Partial saves written.
    pub partial_saves: u32,
    /// True when END_OF_DATA or END_OF_FILE ended the loop.
    pub ended_early: bool,
    /// Status at the end of the run.
    pub final_status: Status,
    /// Report that set the final status, if any.
    #[serde(default)]
    pub last_report: Option<StatusReport>,
}

impl RunReport {
    /// Returns true when the run reached DONE.
    pub fn succeeded(&self) -> bool {
        self.state == DriverState::Done
    }
}
