use cap_core::errors::{CapError, ErrorInfo};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::histogram::Histogram;

/// Statistics lifecycle of an [`AccumulatorGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupState {
    /// No fill since creation or the last reset.
    #[default]
    Empty,
    /// Raw, unnormalized content.
    Accumulating,
    /// Content divided by accepted counts (or loaded from a store).
    Scaled,
    /// Written to a store.
    Persisted,
}

/// Named, insertion-ordered set of histograms owned by one task.
///
/// Fills are pure additions. Scaling and persistence never happen implicitly;
/// the owning task drives them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorGroup {
    name: String,
    #[serde(skip)]
    state: GroupState,
    histograms: IndexMap<String, Histogram>,
}

impl AccumulatorGroup {
    /// Creates an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: GroupState::Empty,
            histograms: IndexMap::new(),
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Number of histograms.
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    /// Returns true when no histogram is booked.
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    /// Adds a histogram. Names must be unique within the group.
    pub fn book(&mut self, histogram: Histogram) -> Result<(), CapError> {
        if self.histograms.contains_key(histogram.name()) {
            return Err(CapError::Histogram(
                ErrorInfo::new("histogram-duplicate", "histogram already booked")
                    .with_context("group", self.name.clone())
                    .with_context("histogram", histogram.name()),
            ));
        }
        self.histograms
            .insert(histogram.name().to_string(), histogram);
        Ok(())
    }

    /// Looks up a histogram.
    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name)
    }

    /// Iterates in booking order.
    pub fn histograms(&self) -> impl Iterator<Item = &Histogram> {
        self.histograms.values()
    }

    /// Adds `weight` at `coords` in histogram `name`.
    ///
    /// Allowed while EMPTY, ACCUMULATING or PERSISTED (a checkpointed group
    /// keeps accumulating); a SCALED group rejects further fills.
    pub fn fill(&mut self, name: &str, coords: &[f64], weight: f64) -> Result<(), CapError> {
        if self.state == GroupState::Scaled {
            return Err(CapError::Histogram(
                ErrorInfo::new("fill-after-scale", "cannot fill a scaled group")
                    .with_context("group", self.name.clone())
                    .with_context("histogram", name)
                    .with_hint("reset the group before accumulating again"),
            ));
        }
        let histogram = self.histograms.get_mut(name).ok_or_else(|| {
            CapError::Histogram(
                ErrorInfo::new("histogram-missing", "no such histogram in group")
                    .with_context("group", self.name.clone())
                    .with_context("histogram", name),
            )
        })?;
        histogram.fill(coords, weight)?;
        self.state = GroupState::Accumulating;
        Ok(())
    }

    /// Divides every histogram of category `k` by `accepted[k]`.
    ///
    /// Categories with a zero (or missing) count are left untouched and
    /// returned so the caller can report them. Applying this twice scales
    /// twice.
    pub fn scale_by_category(&mut self, accepted: &[u64]) -> Vec<usize> {
        let mut skipped = Vec::new();
        for histogram in self.histograms.values_mut() {
            let category = histogram.category();
            match accepted.get(category).copied() {
                Some(count) if count > 0 => histogram.scale(1.0 / count as f64),
                _ => {
                    if !skipped.contains(&category) {
                        skipped.push(category);
                    }
                }
            }
        }
        self.state = GroupState::Scaled;
        skipped
    }

    /// Multiplies every histogram by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for histogram in self.histograms.values_mut() {
            histogram.scale(factor);
        }
        self.state = GroupState::Scaled;
    }

    /// Zeroes every bin and returns the group to EMPTY.
    pub fn reset(&mut self) {
        for histogram in self.histograms.values_mut() {
            histogram.reset();
        }
        self.state = GroupState::Empty;
    }

    /// Records a successful write to a store.
    pub fn mark_persisted(&mut self) {
        self.state = GroupState::Persisted;
    }

    /// Records that the content is normalized (used after loading).
    pub fn mark_scaled(&mut self) {
        self.state = GroupState::Scaled;
    }

    /// Returns true when both groups hold the same histograms with the same binning.
    pub fn same_layout(&self, other: &AccumulatorGroup) -> bool {
        self.histograms.len() == other.histograms.len()
            && self
                .histograms
                .values()
                .zip(other.histograms.values())
                .all(|(a, b)| a.same_layout(b))
    }

    /// Returns a zeroed copy with the same layout.
    pub fn empty_like(&self) -> AccumulatorGroup {
        let mut copy = self.clone();
        copy.reset();
        copy
    }
}
