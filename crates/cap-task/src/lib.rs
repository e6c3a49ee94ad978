#![deny(missing_docs)]
#![doc = "Task tree for the CAP engine: task nodes with owned children, the lifecycle dispatcher, the run context, and the staged statistics workflow driven through them."]

pub mod analysis;
pub mod context;
pub mod dispatch;
pub mod filter;
pub mod source;
pub mod stage;
pub mod task;
pub mod workflow;

pub use analysis::{Analysis, AnalysisTask};
pub use context::RunContext;
pub use dispatch::{configure, dispatch};
pub use filter::{category_label, AcceptAll, Filter, FilterSet, FnFilter};
pub use source::{EventReader, ReadOutcome, SourceTask};
pub use stage::{Phase, Stage};
pub use task::{Counters, TaskCore};
pub use workflow::workflow_defaults;
