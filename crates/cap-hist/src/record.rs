use std::path::{Path, PathBuf};

use cap_core::errors::CapError;
use serde::{Deserialize, Serialize};

use crate::group::AccumulatorGroup;
use crate::store::{KeyValueStore, OpenMode, StoreHandle};

/// Scalar holding the processed-event count.
pub const SCALAR_PROCESSED: &str = "EventProcessed";
/// Scalar holding the accepted-event count.
pub const SCALAR_ACCEPTED: &str = "EventAccepted";
/// Scalar holding the number of filter categories.
pub const SCALAR_CATEGORIES: &str = "NCategories";
/// Scalar holding the subsample index of a partial save.
pub const SCALAR_PARTIAL_INDEX: &str = "PartialIndex";

fn category_scalar(category: usize) -> String {
    format!("{SCALAR_ACCEPTED}_{category}")
}

/// Event counters persisted next to an accumulator group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Events seen.
    pub processed: i64,
    /// Events accepted by at least one filter.
    pub accepted: i64,
    /// Accepted events per filter category.
    #[serde(default)]
    pub accepted_by_category: Vec<i64>,
}

impl Tally {
    /// Writes the counters as scalars.
    pub fn write(&self, handle: &mut dyn StoreHandle) -> Result<(), CapError> {
        handle.write_scalar(SCALAR_PROCESSED, self.processed)?;
        handle.write_scalar(SCALAR_ACCEPTED, self.accepted)?;
        handle.write_scalar(SCALAR_CATEGORIES, self.accepted_by_category.len() as i64)?;
        for (category, &count) in self.accepted_by_category.iter().enumerate() {
            handle.write_scalar(&category_scalar(category), count)?;
        }
        Ok(())
    }

    /// Reads the counters back. Documents without category scalars yield an
    /// empty per-category list.
    pub fn read(handle: &dyn StoreHandle) -> Result<Self, CapError> {
        let processed = handle.read_scalar(SCALAR_PROCESSED)?;
        let accepted = handle.read_scalar(SCALAR_ACCEPTED)?;
        let categories = handle.read_scalar(SCALAR_CATEGORIES).unwrap_or(0).max(0) as usize;
        let accepted_by_category = (0..categories)
            .map(|category| handle.read_scalar(&category_scalar(category)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            processed,
            accepted,
            accepted_by_category,
        })
    }

    /// Accepted count used to normalize histograms of `category`.
    pub fn normalization(&self, category: usize) -> i64 {
        self.accepted_by_category
            .get(category)
            .copied()
            .unwrap_or(self.accepted)
    }

    /// Element-wise sum.
    pub fn merge(&mut self, other: &Tally) {
        self.processed += other.processed;
        self.accepted += other.accepted;
        if self.accepted_by_category.len() < other.accepted_by_category.len() {
            self.accepted_by_category
                .resize(other.accepted_by_category.len(), 0);
        }
        for (sum, value) in self
            .accepted_by_category
            .iter_mut()
            .zip(&other.accepted_by_category)
        {
            *sum += value;
        }
    }
}

/// Immutable snapshot of one accumulator group taken by a partial save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSaveRecord {
    /// Monotonically increasing subsample index, starting at zero.
    pub index: u32,
    /// Counters current at save time.
    pub tally: Tally,
    /// Raw (unscaled) group content.
    pub group: AccumulatorGroup,
}

impl PartialSaveRecord {
    /// Writes the record into an open handle.
    pub fn write(&self, handle: &mut dyn StoreHandle) -> Result<(), CapError> {
        handle.write_scalar(SCALAR_PARTIAL_INDEX, i64::from(self.index))?;
        self.tally.write(handle)?;
        handle.write_group(&self.group)
    }

    /// Reads the record for `group_name` from an open handle.
    pub fn read(handle: &dyn StoreHandle, group_name: &str) -> Result<Self, CapError> {
        let index = handle.read_scalar(SCALAR_PARTIAL_INDEX)?.max(0) as u32;
        Ok(Self {
            index,
            tally: Tally::read(handle)?,
            group: handle.read_group(group_name)?,
        })
    }

    /// Opens `path`, writes the record and closes the handle.
    pub fn save(&self, store: &dyn KeyValueStore, path: &Path) -> Result<(), CapError> {
        let mut handle = store.open(path, OpenMode::Create)?;
        self.write(&mut *handle)?;
        handle.close()
    }

    /// Opens `path` read-only and reads the record for `group_name`.
    pub fn load(
        store: &dyn KeyValueStore,
        path: &Path,
        group_name: &str,
    ) -> Result<Self, CapError> {
        let handle = store.open(path, OpenMode::Read)?;
        let record = Self::read(&*handle, group_name)?;
        handle.close()?;
        Ok(record)
    }
}

/// `<dir>/<stem>.json`: the final (non-partial) document.
pub fn output_file(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.json"))
}

/// `<dir>/<stem>_Part<index>.json`: one partial save.
pub fn partial_file(dir: &Path, stem: &str, index: u32) -> PathBuf {
    dir.join(format!("{stem}_Part{index:03}.json"))
}

/// `<dir>/<stem>_Subsample.json`: the aggregated result.
pub fn subsample_file(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}_Subsample.json"))
}

/// Parses the index out of a partial-save file name produced by [`partial_file`].
pub fn partial_index_of(file_name: &str, stem: &str) -> Option<u32> {
    file_name
        .strip_prefix(stem)?
        .strip_prefix("_Part")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}
