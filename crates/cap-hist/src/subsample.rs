//! Per-bin mean and standard error across K partial-save snapshots.

use cap_core::errors::{CapError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::group::AccumulatorGroup;
use crate::record::{PartialSaveRecord, Tally};

/// How each snapshot is normalized before averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Average raw bin contents.
    None,
    /// Divide each histogram by the snapshot's accepted count for its category.
    #[default]
    ByAccepted,
}

/// Aggregation knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubsampleOptions {
    /// Per-snapshot normalization.
    #[serde(default)]
    pub normalization: Normalization,
}

/// Outcome of [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubsampleResult {
    /// Mean per bin as content, standard error of the mean as error. SCALED.
    pub group: AccumulatorGroup,
    /// Number of snapshots combined.
    pub samples: usize,
    /// Counters summed over all snapshots.
    pub tally: Tally,
    /// Set when the result carries no error estimate (fewer than two samples)
    /// or a snapshot could not be normalized.
    pub warnings: Vec<String>,
}

/// Combines snapshots of one group: mean `(1/K)Σ S_k`, Bessel-corrected
/// variance, error `sqrt(var/K)`.
///
/// The bin layout of every snapshot is checked before any arithmetic; a
/// mismatch is fatal. An empty input is an error. With a single snapshot the
/// errors are zero and a warning is returned.
pub fn aggregate(
    records: &[PartialSaveRecord],
    options: &SubsampleOptions,
) -> Result<SubsampleResult, CapError> {
    let first = records.first().ok_or_else(|| {
        CapError::Subsample(ErrorInfo::new(
            "subsample-empty",
            "no partial-save snapshots to aggregate",
        ))
    })?;
    for record in &records[1..] {
        if !first.group.same_layout(&record.group) {
            return Err(CapError::Fatal(
                ErrorInfo::new("subsample-layout", "snapshot bin layouts differ")
                    .with_context("group", first.group.name())
                    .with_context("first_index", first.index.to_string())
                    .with_context("mismatch_index", record.index.to_string()),
            ));
        }
    }

    let mut warnings = Vec::new();
    let samples: Vec<AccumulatorGroup> = records
        .iter()
        .map(|record| normalized(record, options.normalization, &mut warnings))
        .collect();

    let k = samples.len() as f64;
    let mut tally = Tally::default();
    for record in records {
        tally.merge(&record.tally);
    }

    let derived: Vec<_> = first
        .group
        .histograms()
        .map(|template| {
            let mut histogram = template.empty_like();
            let name = template.name();
            let mut entries = 0;
            for cell in 0..template.cells() {
                let values: Vec<f64> = samples
                    .iter()
                    .filter_map(|sample| sample.get(name))
                    .map(|h| h.content(cell))
                    .collect();
                let mean = values.iter().sum::<f64>() / k;
                let variance = if values.len() > 1 {
                    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (k - 1.0)
                } else {
                    0.0
                };
                histogram.set_cell(cell, mean, (variance / k).sqrt());
            }
            for sample in &samples {
                if let Some(h) = sample.get(name) {
                    entries += h.entries();
                }
            }
            histogram.set_entries(entries);
            histogram
        })
        .collect();

    let mut output = AccumulatorGroup::new(first.group.name());
    for histogram in derived {
        output.book(histogram)?;
    }
    output.mark_scaled();

    if records.len() < 2 {
        warnings.push(format!(
            "only {} snapshot(s) for group {}; errors set to zero",
            records.len(),
            first.group.name()
        ));
    }

    Ok(SubsampleResult {
        group: output,
        samples: records.len(),
        tally,
        warnings,
    })
}

fn normalized(
    record: &PartialSaveRecord,
    normalization: Normalization,
    warnings: &mut Vec<String>,
) -> AccumulatorGroup {
    let mut group = record.group.clone();
    if normalization == Normalization::None {
        return group;
    }
    let categories = group
        .histograms()
        .map(|h| h.category())
        .max()
        .map_or(0, |max| max + 1);
    let counts: Vec<u64> = (0..categories)
        .map(|category| record.tally.normalization(category).max(0) as u64)
        .collect();
    let skipped = group.scale_by_category(&counts);
    for category in skipped {
        warnings.push(format!(
            "snapshot {} of group {} has no accepted events in category {category}",
            record.index,
            record.group.name()
        ));
    }
    group
}
