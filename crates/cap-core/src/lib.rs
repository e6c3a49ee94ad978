#![deny(missing_docs)]
#![doc = "Core error, status and provenance types for the CAP analysis engine."]

pub mod errors;
pub mod provenance;
pub mod rng;
pub mod status;

pub use errors::{CapError, ErrorInfo};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use status::{Site, Status, StatusReport, StatusToken};
