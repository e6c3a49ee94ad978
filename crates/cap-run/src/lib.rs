#![deny(missing_docs)]
#![doc = "Iterator driver for the CAP engine: runs the task lifecycle for N iterations with partial saves, subsample resets and end-of-input handling, and records the outcome as a report and a manifest."]

pub mod driver;
/// Run manifest serialization helpers.
pub mod manifest;
/// Driver run summaries.
pub mod report;

pub use driver::{DriverSettings, DriverState, IteratorDriver};
pub use manifest::{RunManifest, TaskSummary};
pub use report::RunReport;
