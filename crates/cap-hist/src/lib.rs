#![deny(missing_docs)]
#![doc = "Accumulator groups with an explicit accumulate, scale, persist lifecycle; a persisted key-value store collaborator; partial-save snapshots and subsample statistics."]

/// Accumulator groups and their lifecycle state.
pub mod group;
/// Canonical hashing helpers.
pub mod hash;
/// Binned counters.
pub mod histogram;
/// Partial-save records, counters and file naming.
pub mod record;
/// Canonical JSON serde helpers.
pub mod serde;
pub mod store;
pub mod subsample;

pub use group::{AccumulatorGroup, GroupState};
pub use histogram::{Axis, Histogram};
pub use record::{
    output_file, partial_file, partial_index_of, subsample_file, PartialSaveRecord, Tally,
};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, OpenMode, StoreDocument, StoreHandle};
pub use subsample::{aggregate, Normalization, SubsampleOptions, SubsampleResult};
