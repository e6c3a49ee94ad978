//! Offline helpers: partial-save discovery, aggregation from disk and CSV export.

use std::path::{Path, PathBuf};

use cap_core::errors::{CapError, ErrorInfo};
use cap_hist::{
    aggregate, partial_index_of, subsample_file, AccumulatorGroup, KeyValueStore, OpenMode,
    PartialSaveRecord, SubsampleOptions, SubsampleResult,
};
use serde::Serialize;
use walkdir::WalkDir;

fn io_error(code: &str, err: impl ToString, path: &Path) -> CapError {
    CapError::Store(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Partial-save documents for `stem` directly inside `dir`, sorted by index.
pub fn discover_partials(dir: &Path, stem: &str) -> Result<Vec<(u32, PathBuf)>, CapError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| io_error("partials-scan", err, dir))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if let Some(index) = partial_index_of(name, stem) {
            found.push((index, entry.into_path()));
        }
    }
    found.sort();
    Ok(found)
}

/// Loads every partial save of `stem` in `dir` and aggregates group `group`.
pub fn aggregate_directory(
    store: &dyn KeyValueStore,
    dir: &Path,
    stem: &str,
    group: &str,
    options: &SubsampleOptions,
) -> Result<SubsampleResult, CapError> {
    let partials = discover_partials(dir, stem)?;
    tracing::info!(dir = %dir.display(), stem, found = partials.len(), "partial saves discovered");
    let records = partials
        .iter()
        .map(|(_, path)| PartialSaveRecord::load(store, path, group))
        .collect::<Result<Vec<_>, _>>()?;
    aggregate(&records, options)
}

/// Writes an aggregation result to `<dir>/<stem>_Subsample.json`.
pub fn write_subsample(
    store: &dyn KeyValueStore,
    dir: &Path,
    stem: &str,
    result: &SubsampleResult,
) -> Result<PathBuf, CapError> {
    let path = subsample_file(dir, stem);
    let mut handle = store.open(&path, OpenMode::Create)?;
    result.tally.write(&mut *handle)?;
    handle.write_group(&result.group)?;
    handle.close()?;
    Ok(path)
}

#[derive(Debug, Serialize)]
struct BinRow<'a> {
    histogram: &'a str,
    category: usize,
    cell: usize,
    value: f64,
    error: f64,
}

/// Writes one CSV row per cell of every histogram in `group`.
pub fn export_csv(group: &AccumulatorGroup, path: &Path) -> Result<usize, CapError> {
    let mut writer = csv::Writer::from_path(path).map_err(|err| io_error("csv-open", err, path))?;
    let mut rows = 0;
    for histogram in group.histograms() {
        for cell in 0..histogram.cells() {
            writer
                .serialize(BinRow {
                    histogram: histogram.name(),
                    category: histogram.category(),
                    cell,
                    value: histogram.content(cell),
                    error: histogram.error(cell),
                })
                .map_err(|err| io_error("csv-write", err, path))?;
            rows += 1;
        }
    }
    writer.flush().map_err(|err| io_error("csv-flush", err, path))?;
    Ok(rows)
}
